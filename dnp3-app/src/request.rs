//! Application layer request building
//!
//! Requests are `[control][function][object blocks...]`; a master request
//! always fits one fragment, so FIR and FIN are both set.

use crate::control::{CON_FLAG, FIN_FLAG, FIR_FLAG, SEQ_MASK, UNS_FLAG};
use crate::error::{Dnp3Error, Dnp3Result};
use crate::function::AppFunction;
use crate::header::ObjectHeader;
use dnp3_objects::{class_variation, group};

/// One object block of a request: header plus optional object data
/// (index prefixes and command blocks for control requests).
#[derive(Debug, Clone)]
pub struct RequestObject {
    pub header: ObjectHeader,
    pub data: Vec<u8>,
}

impl RequestObject {
    pub fn new(header: ObjectHeader) -> Self {
        Self {
            header,
            data: Vec::new(),
        }
    }

    pub fn with_data(header: ObjectHeader, data: Vec<u8>) -> Self {
        Self { header, data }
    }
}

/// DNP3 application layer request
#[derive(Debug, Clone)]
pub struct ApplicationRequest {
    pub function: AppFunction,
    pub sequence: u8,
    pub confirm: bool,
    pub objects: Vec<RequestObject>,
}

impl ApplicationRequest {
    /// Create a request with the given function and sequence (0-15).
    pub fn new(function: AppFunction, sequence: u8) -> Dnp3Result<Self> {
        if sequence > SEQ_MASK {
            return Err(Dnp3Error::Validation(format!(
                "application sequence must be 0-15, got {}",
                sequence
            )));
        }
        Ok(Self {
            function,
            sequence,
            confirm: false,
            objects: Vec::new(),
        })
    }

    /// The application control byte: FIR|FIN, optional CON, sequence.
    pub fn control(&self) -> u8 {
        let mut ctrl = FIR_FLAG | FIN_FLAG | (self.sequence & SEQ_MASK);
        if self.confirm {
            ctrl |= CON_FLAG;
        }
        ctrl
    }

    /// Serialize the request to APDU bytes.
    pub fn to_bytes(&self) -> Dnp3Result<Vec<u8>> {
        let mut out = vec![self.control(), self.function.code()];
        for object in &self.objects {
            out.extend_from_slice(&object.header.encode()?);
            out.extend_from_slice(&object.data);
        }
        Ok(out)
    }

    /// READ of one group/variation over an index range. The qualifier is
    /// chosen by range width (0x00 for byte-sized ranges, 0x01 otherwise).
    pub fn read_range(
        group: u8,
        variation: u8,
        start: u16,
        stop: u16,
        sequence: u8,
    ) -> Dnp3Result<Self> {
        let mut request = Self::new(AppFunction::Read, sequence)?;
        request
            .objects
            .push(RequestObject::new(ObjectHeader::range(
                group, variation, start, stop,
            )?));
        Ok(request)
    }

    /// READ of class 0-3 with qualifier 0x06.
    pub fn read_class(class: u8, sequence: u8) -> Dnp3Result<Self> {
        let variation = class_to_variation(class)?;
        let mut request = Self::new(AppFunction::Read, sequence)?;
        request.objects.push(RequestObject::new(
            ObjectHeader::all_objects(group::CLASS_OBJECTS, variation),
        ));
        Ok(request)
    }

    /// Integrity poll: a Class 0 read.
    pub fn integrity_poll(sequence: u8) -> Dnp3Result<Self> {
        Self::read_class(0, sequence)
    }

    /// A control request (SELECT / OPERATE / DIRECT_OPERATE) carrying one
    /// indexed command block with qualifier 0x17.
    ///
    /// # Errors
    /// Validation error when `index` does not fit the 1-byte prefix.
    pub fn control_command(
        function: AppFunction,
        group: u8,
        variation: u8,
        index: u16,
        block: &[u8],
        sequence: u8,
    ) -> Dnp3Result<Self> {
        if index > 0xFF {
            return Err(Dnp3Error::Validation(format!(
                "command index must be 0-255 for the 1-byte index prefix, got {}",
                index
            )));
        }
        let mut request = Self::new(function, sequence)?;
        let mut data = Vec::with_capacity(1 + block.len());
        data.push(index as u8);
        data.extend_from_slice(block);
        request.objects.push(RequestObject::with_data(
            ObjectHeader::indexed(group, variation, 1),
            data,
        ));
        Ok(request)
    }

    /// CONFIRM of a response, echoing its sequence and UNS flag.
    pub fn confirm(sequence: u8, unsolicited: bool) -> Dnp3Result<Vec<u8>> {
        if sequence > SEQ_MASK {
            return Err(Dnp3Error::Validation(format!(
                "application sequence must be 0-15, got {}",
                sequence
            )));
        }
        let mut ctrl = FIR_FLAG | FIN_FLAG | (sequence & SEQ_MASK);
        if unsolicited {
            ctrl |= UNS_FLAG;
        }
        Ok(vec![ctrl, AppFunction::Confirm.code()])
    }

    /// ENABLE_UNSOLICITED / DISABLE_UNSOLICITED over the classes selected
    /// by `class_mask` (bit 0 = class 1, bit 1 = class 2, bit 2 = class 3).
    pub fn unsolicited_control(
        enable: bool,
        class_mask: u8,
        sequence: u8,
    ) -> Dnp3Result<Self> {
        let function = if enable {
            AppFunction::EnableUnsolicited
        } else {
            AppFunction::DisableUnsolicited
        };
        let mut request = Self::new(function, sequence)?;
        let classes = [
            (0x01, class_variation::CLASS_1),
            (0x02, class_variation::CLASS_2),
            (0x04, class_variation::CLASS_3),
        ];
        for (bit, variation) in classes {
            if class_mask & bit != 0 {
                request.objects.push(RequestObject::new(
                    ObjectHeader::all_objects(group::CLASS_OBJECTS, variation),
                ));
            }
        }
        Ok(request)
    }

    /// COLD_RESTART or WARM_RESTART with no objects.
    pub fn restart(cold: bool, sequence: u8) -> Dnp3Result<Self> {
        let function = if cold {
            AppFunction::ColdRestart
        } else {
            AppFunction::WarmRestart
        };
        Self::new(function, sequence)
    }
}

fn class_to_variation(class: u8) -> Dnp3Result<u8> {
    match class {
        0 => Ok(class_variation::CLASS_0),
        1 => Ok(class_variation::CLASS_1),
        2 => Ok(class_variation::CLASS_2),
        3 => Ok(class_variation::CLASS_3),
        other => Err(Dnp3Error::Validation(format!(
            "class must be 0-3, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnp3_objects::Crob;

    #[test]
    fn test_integrity_poll_bytes() {
        let apdu = ApplicationRequest::integrity_poll(0)
            .unwrap()
            .to_bytes()
            .unwrap();
        assert_eq!(apdu, vec![0xC0, 0x01, 0x3C, 0x01, 0x06]);
    }

    #[test]
    fn test_class_poll_variations() {
        for (class, variation) in [(1u8, 0x02u8), (2, 0x03), (3, 0x04)] {
            let apdu = ApplicationRequest::read_class(class, 5)
                .unwrap()
                .to_bytes()
                .unwrap();
            assert_eq!(apdu, vec![0xC5, 0x01, 0x3C, variation, 0x06]);
        }
        assert!(ApplicationRequest::read_class(4, 0).is_err());
    }

    #[test]
    fn test_sequence_in_control_byte() {
        let apdu = ApplicationRequest::integrity_poll(9)
            .unwrap()
            .to_bytes()
            .unwrap();
        assert_eq!(apdu[0], 0xC9);
        assert!(ApplicationRequest::new(AppFunction::Read, 16).is_err());
    }

    #[test]
    fn test_read_range_qualifier_selection() {
        let apdu = ApplicationRequest::read_range(1, 0, 0, 10, 0)
            .unwrap()
            .to_bytes()
            .unwrap();
        assert_eq!(apdu, vec![0xC0, 0x01, 0x01, 0x00, 0x00, 0x00, 0x0A]);

        let apdu = ApplicationRequest::read_range(30, 0, 0, 300, 0)
            .unwrap()
            .to_bytes()
            .unwrap();
        assert_eq!(
            apdu,
            vec![0xC0, 0x01, 0x1E, 0x00, 0x01, 0x00, 0x00, 0x2C, 0x01]
        );
    }

    #[test]
    fn test_direct_operate_crob_bytes() {
        let crob = Crob::latch_on();
        let apdu = ApplicationRequest::control_command(
            AppFunction::DirectOperate,
            12,
            1,
            0,
            &crob.encode(),
            0,
        )
        .unwrap()
        .to_bytes()
        .unwrap();
        assert_eq!(
            apdu,
            vec![
                0xC0, 0x05, // control, DIRECT_OPERATE
                0x0C, 0x01, 0x17, 0x01, // g12v1, qualifier 0x17, count 1
                0x00, // index 0
                0x03, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0x00, // CROB
            ]
        );
    }

    #[test]
    fn test_control_command_index_validation() {
        let crob = Crob::latch_on();
        assert!(ApplicationRequest::control_command(
            AppFunction::Select,
            12,
            1,
            256,
            &crob.encode(),
            0,
        )
        .is_err());
    }

    #[test]
    fn test_confirm_bytes() {
        assert_eq!(
            ApplicationRequest::confirm(3, false).unwrap(),
            vec![0xC3, 0x00]
        );
        assert_eq!(
            ApplicationRequest::confirm(3, true).unwrap(),
            vec![0xD3, 0x00]
        );
        assert!(ApplicationRequest::confirm(16, false).is_err());
    }

    #[test]
    fn test_unsolicited_control() {
        let apdu = ApplicationRequest::unsolicited_control(true, 0x07, 1)
            .unwrap()
            .to_bytes()
            .unwrap();
        assert_eq!(
            apdu,
            vec![
                0xC1, 0x14, // ENABLE_UNSOLICITED
                0x3C, 0x02, 0x06, 0x3C, 0x03, 0x06, 0x3C, 0x04, 0x06,
            ]
        );

        let apdu = ApplicationRequest::unsolicited_control(false, 0x01, 2)
            .unwrap()
            .to_bytes()
            .unwrap();
        assert_eq!(apdu, vec![0xC2, 0x15, 0x3C, 0x02, 0x06]);
    }

    #[test]
    fn test_restart_requests() {
        let apdu = ApplicationRequest::restart(true, 0).unwrap().to_bytes().unwrap();
        assert_eq!(apdu, vec![0xC0, 0x0D]);
        let apdu = ApplicationRequest::restart(false, 1).unwrap().to_bytes().unwrap();
        assert_eq!(apdu, vec![0xC1, 0x0E]);
    }
}
