//! Service specific views on decoded telemetry.
//!
//! [ServiceTm::from_packet] dispatches on the service type of a [PusTmReader] and extracts the
//! typed fields of the known services. Everything else, including packets whose application
//! data is too short for their service layout, maps to [ServiceTm::Generic].
use crate::ecss::PusPacket;
use crate::tc::TcInfo;
use crate::tm::{PusTmCreator, PusTmReader};
use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PusServiceId {
    Verification = 1,
    DeviceAccess = 2,
    Housekeeping = 3,
    Event = 5,
    Action = 8,
    Time = 9,
    Test = 17,
    Parameter = 20,
    Mode = 200,
}

pub mod subservices {
    pub const TM_ACCEPTANCE_SUCCESS: u8 = 1;
    pub const TM_ACCEPTANCE_FAILURE: u8 = 2;
    pub const TM_START_SUCCESS: u8 = 3;
    pub const TM_START_FAILURE: u8 = 4;
    pub const TM_STEP_SUCCESS: u8 = 5;
    pub const TM_STEP_FAILURE: u8 = 6;
    pub const TM_COMPLETION_SUCCESS: u8 = 7;
    pub const TM_COMPLETION_FAILURE: u8 = 8;

    pub const TM_HK_DEFINITION_REPORT: u8 = 10;
    pub const TM_DIAG_DEFINITION_REPORT: u8 = 12;
    pub const TM_HK_REPORT: u8 = 25;
    pub const TM_DIAG_REPORT: u8 = 26;

    pub const TM_WIRETAPPING_COMMAND: u8 = 130;
    pub const TM_WIRETAPPING_REPLY: u8 = 131;
    pub const TM_ACTION_DATA_REPLY: u8 = 130;

    pub const TC_PING: u8 = 1;
    pub const TM_PING_REPLY: u8 = 2;

    pub const TM_MODE_REACHED: u8 = 6;
    pub const TM_CANT_REACH_MODE: u8 = 7;
    pub const TM_WRONG_MODE: u8 = 8;
}

fn read_u8(data: &[u8], idx: usize) -> Option<u8> {
    data.get(idx).copied()
}

fn read_u16(data: &[u8], idx: usize) -> Option<u16> {
    data.get(idx..idx + 2)?.try_into().ok().map(u16::from_be_bytes)
}

fn read_u32(data: &[u8], idx: usize) -> Option<u32> {
    data.get(idx..idx + 4)?.try_into().ok().map(u32::from_be_bytes)
}

fn read_f32(data: &[u8], idx: usize) -> Option<f32> {
    data.get(idx..idx + 4)?.try_into().ok().map(f32::from_be_bytes)
}

fn read_f64(data: &[u8], idx: usize) -> Option<f64> {
    data.get(idx..idx + 8)?.try_into().ok().map(f64::from_be_bytes)
}

/// Error code and the two parameters of a failure report.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FailureData {
    pub error_code: u16,
    pub param1: u32,
    pub param2: u32,
}

impl FailureData {
    fn read(data: &[u8], idx: usize) -> Option<Self> {
        Some(Self {
            error_code: read_u16(data, idx)?,
            param1: read_u32(data, idx + 2)?,
            param2: read_u32(data, idx + 6)?,
        })
    }
}

/// Even subservices report failures, odd subservices report successes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VerificationReport {
    AcceptanceSuccess,
    AcceptanceFailure(FailureData),
    StartSuccess,
    StartFailure(FailureData),
    StepSuccess { step: u8 },
    StepFailure { step: u8, failure: FailureData },
    CompletionSuccess,
    CompletionFailure(FailureData),
}

impl VerificationReport {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::AcceptanceFailure(_)
                | Self::StartFailure(_)
                | Self::StepFailure { .. }
                | Self::CompletionFailure(_)
        )
    }

    pub fn failure_data(&self) -> Option<&FailureData> {
        match self {
            Self::AcceptanceFailure(failure)
            | Self::StartFailure(failure)
            | Self::CompletionFailure(failure)
            | Self::StepFailure { failure, .. } => Some(failure),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::AcceptanceSuccess => "Success Verification : Acceptance success",
            Self::AcceptanceFailure(_) => "Failure Verification : Acceptance failure",
            Self::StartSuccess => "Success Verification : Start success",
            Self::StartFailure(_) => "Failure Verification : Start failure",
            Self::StepSuccess { .. } => "Success Verification : Step success",
            Self::StepFailure { .. } => "Failure Verification : Step failure",
            Self::CompletionSuccess => "Success Verification : Completion success",
            Self::CompletionFailure(_) => "Failure Verification : Completion failure",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Service1Tm {
    pub tc_packet_id: u16,
    pub tc_ssc: u16,
    pub report: VerificationReport,
}

impl Service1Tm {
    pub fn from_app_data(subservice: u8, data: &[u8]) -> Option<Self> {
        use subservices::*;
        let tc_packet_id = read_u16(data, 0)?;
        let tc_ssc = read_u16(data, 2)? & 0x3FFF;
        let report = match subservice {
            TM_ACCEPTANCE_SUCCESS => VerificationReport::AcceptanceSuccess,
            TM_ACCEPTANCE_FAILURE => {
                VerificationReport::AcceptanceFailure(FailureData::read(data, 4)?)
            }
            TM_START_SUCCESS => VerificationReport::StartSuccess,
            TM_START_FAILURE => VerificationReport::StartFailure(FailureData::read(data, 4)?),
            TM_STEP_SUCCESS => VerificationReport::StepSuccess {
                step: read_u8(data, 4)?,
            },
            TM_STEP_FAILURE => VerificationReport::StepFailure {
                step: read_u8(data, 4)?,
                failure: FailureData::read(data, 5)?,
            },
            TM_COMPLETION_SUCCESS => VerificationReport::CompletionSuccess,
            TM_COMPLETION_FAILURE => {
                VerificationReport::CompletionFailure(FailureData::read(data, 4)?)
            }
            _ => {
                log::error!("invalid verification subservice {subservice}");
                return None;
            }
        };
        Some(Self {
            tc_packet_id,
            tc_ssc,
            report,
        })
    }

    /// Create a verification report for the given telecommand. Failure reports are filled
    /// with the supplied failure data.
    pub fn creator(
        apid: u16,
        ssc: u16,
        tc_info: &TcInfo,
        subservice: u8,
        failure: Option<FailureData>,
    ) -> PusTmCreator {
        let mut app_data = Vec::with_capacity(14);
        app_data.extend_from_slice(&tc_info.packet_id.to_be_bytes());
        let tc_psc = (0b11 << 14) | (tc_info.ssc & 0x3FFF);
        app_data.extend_from_slice(&tc_psc.to_be_bytes());
        if let Some(failure) = failure {
            app_data.extend_from_slice(&failure.error_code.to_be_bytes());
            app_data.extend_from_slice(&failure.param1.to_be_bytes());
            app_data.extend_from_slice(&failure.param2.to_be_bytes());
        }
        PusTmCreator::new(apid, PusServiceId::Verification as u8, subservice, ssc, app_data)
    }
}

/// Housekeeping sets with known layouts.
#[derive(Debug, Clone, PartialEq)]
pub enum HkDataSet {
    Test {
        test_bool: bool,
        test_u8: u8,
        test_u16: u16,
        test_u32: u32,
        float_vec: [f32; 2],
        validity: Vec<u8>,
    },
    Gps {
        fix_mode: u8,
        sv_in_fix: u8,
        gnss_week: u16,
        time_of_week: u32,
        latitude: u32,
        longitude: u32,
        mean_sea_altitude: u32,
        position: [f64; 3],
        velocity: [f64; 3],
        validity: Vec<u8>,
    },
    Unknown,
}

pub const GPS0_SID: u32 = 0x1F00;
pub const GPS1_SID: u32 = 0x2F00;
pub const TEST_SID: u32 = 0x4300;
pub const CUSTOM_SID: u32 = 0x4400;

impl HkDataSet {
    fn from_params(sid: u32, params: &[u8]) -> Option<Self> {
        match sid {
            GPS0_SID | GPS1_SID => Some(Self::Gps {
                fix_mode: read_u8(params, 0)?,
                sv_in_fix: read_u8(params, 1)?,
                gnss_week: read_u16(params, 2)?,
                time_of_week: read_u32(params, 4)?,
                latitude: read_u32(params, 8)?,
                longitude: read_u32(params, 12)?,
                mean_sea_altitude: read_u32(params, 16)?,
                position: [
                    read_f64(params, 20)?,
                    read_f64(params, 28)?,
                    read_f64(params, 36)?,
                ],
                velocity: [
                    read_f64(params, 44)?,
                    read_f64(params, 52)?,
                    read_f64(params, 60)?,
                ],
                validity: params[68..].to_vec(),
            }),
            TEST_SID | CUSTOM_SID => Some(Self::Test {
                test_bool: read_u8(params, 0)? != 0,
                test_u8: read_u8(params, 1)?,
                test_u16: read_u16(params, 2)?,
                test_u32: read_u32(params, 4)?,
                float_vec: [read_f32(params, 8)?, read_f32(params, 12)?],
                validity: params[16..].to_vec(),
            }),
            _ => Some(Self::Unknown),
        }
    }

    pub fn num_params(&self) -> usize {
        match self {
            Self::Test { .. } => 6,
            Self::Gps { .. } => 13,
            Self::Unknown => 0,
        }
    }

    pub fn validity_buffer(&self) -> &[u8] {
        match self {
            Self::Test { validity, .. } | Self::Gps { validity, .. } => validity,
            Self::Unknown => &[],
        }
    }

    pub fn column_headers(&self) -> Vec<&'static str> {
        match self {
            Self::Test { .. } => vec!["Bool", "UINT8", "UINT16", "UINT32", "FLOAT1", "FLOAT2"],
            Self::Gps { .. } => vec![
                "Fix Mode",
                "SV in Fix",
                "GNSS Week",
                "Time of Week",
                "Latitude",
                "Longitude",
                "Mean Sea Altitude",
                "Position X",
                "Position Y",
                "Position Z",
                "Velocity X",
                "Velocity Y",
                "Velocity Z",
            ],
            Self::Unknown => vec![],
        }
    }

    pub fn column_content(&self) -> Vec<String> {
        match self {
            Self::Test {
                test_bool,
                test_u8,
                test_u16,
                test_u32,
                float_vec,
                ..
            } => vec![
                test_bool.to_string(),
                test_u8.to_string(),
                test_u16.to_string(),
                test_u32.to_string(),
                float_vec[0].to_string(),
                float_vec[1].to_string(),
            ],
            Self::Gps {
                fix_mode,
                sv_in_fix,
                gnss_week,
                time_of_week,
                latitude,
                longitude,
                mean_sea_altitude,
                position,
                velocity,
                ..
            } => {
                let mut content = vec![
                    fix_mode.to_string(),
                    sv_in_fix.to_string(),
                    gnss_week.to_string(),
                    time_of_week.to_string(),
                    latitude.to_string(),
                    longitude.to_string(),
                    mean_sea_altitude.to_string(),
                ];
                content.extend(position.iter().map(|v| v.to_string()));
                content.extend(velocity.iter().map(|v| v.to_string()));
                content
            }
            Self::Unknown => vec![],
        }
    }

    /// Validity flags, one bit per parameter, most significant bit first.
    pub fn validity_flags(&self) -> Vec<bool> {
        let buf = self.validity_buffer();
        (0..self.num_params())
            .map(|idx| {
                buf.get(idx / 8)
                    .map(|byte| (byte >> (7 - (idx % 8))) & 1 == 1)
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HkContent {
    Definition {
        reporting_enabled: bool,
        collection_interval: f32,
        pool_ids: Vec<u32>,
    },
    Data {
        params: Vec<u8>,
        data_set: HkDataSet,
    },
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Service3Tm {
    pub sid: u32,
    pub content: HkContent,
}

impl Service3Tm {
    pub fn from_app_data(subservice: u8, data: &[u8]) -> Option<Self> {
        use subservices::*;
        let sid = read_u32(data, 0)?;
        let content = match subservice {
            TM_HK_DEFINITION_REPORT | TM_DIAG_DEFINITION_REPORT => {
                let reporting_enabled = read_u8(data, 4)? == 1;
                let collection_interval = read_f32(data, 5)?;
                let num_params = read_u8(data, 9)? as usize;
                let pool_ids = (0..num_params)
                    .map(|idx| read_u32(data, 10 + idx * 4))
                    .collect::<Option<Vec<u32>>>()?;
                HkContent::Definition {
                    reporting_enabled,
                    collection_interval,
                    pool_ids,
                }
            }
            TM_HK_REPORT | TM_DIAG_REPORT => {
                let params = data[4..].to_vec();
                let data_set = HkDataSet::from_params(sid, &params).unwrap_or_else(|| {
                    log::warn!("HK data for SID {sid:#010x} shorter than expected");
                    HkDataSet::Unknown
                });
                HkContent::Data { params, data_set }
            }
            _ => HkContent::Other,
        };
        Some(Self { sid, content })
    }

    pub fn param_len(&self) -> usize {
        match &self.content {
            HkContent::Data { params, .. } => params.len(),
            _ => 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Severity {
    Info = 1,
    Low = 2,
    Medium = 3,
    High = 4,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Service5Tm {
    pub severity: Option<Severity>,
    pub event_id: u16,
    pub reporter_id: u32,
    pub param1: u32,
    pub param2: u32,
}

impl Service5Tm {
    pub fn from_app_data(subservice: u8, data: &[u8]) -> Option<Self> {
        Some(Self {
            severity: Severity::try_from(subservice).ok(),
            event_id: read_u16(data, 0)?,
            reporter_id: read_u32(data, 2)?,
            param1: read_u32(data, 6)?,
            param2: read_u32(data, 10)?,
        })
    }

    pub fn creator(apid: u16, ssc: u16, severity: Severity, event: &Service5Tm) -> PusTmCreator {
        let mut app_data = Vec::with_capacity(14);
        app_data.extend_from_slice(&event.event_id.to_be_bytes());
        app_data.extend_from_slice(&event.reporter_id.to_be_bytes());
        app_data.extend_from_slice(&event.param1.to_be_bytes());
        app_data.extend_from_slice(&event.param2.to_be_bytes());
        PusTmCreator::new(apid, PusServiceId::Event as u8, severity as u8, ssc, app_data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service20Tm {
    pub parameter_id: u32,
    pub payload: Vec<u8>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ModeReport {
    ModeReached { mode: u32, submode: u8 },
    WrongMode { mode: u32, submode: u8 },
    CantReachMode { return_code: u16 },
    Other,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Service200Tm {
    pub object_id: u32,
    pub report: ModeReport,
}

impl Service200Tm {
    pub fn from_app_data(subservice: u8, data: &[u8]) -> Option<Self> {
        use subservices::*;
        let object_id = read_u32(data, 0)?;
        let report = match subservice {
            TM_CANT_REACH_MODE => ModeReport::CantReachMode {
                return_code: read_u16(data, 4)?,
            },
            TM_MODE_REACHED => ModeReport::ModeReached {
                mode: read_u32(data, 4)?,
                submode: read_u8(data, 8)?,
            },
            TM_WRONG_MODE => ModeReport::WrongMode {
                mode: read_u32(data, 4)?,
                submode: read_u8(data, 8)?,
            },
            _ => ModeReport::Other,
        };
        Some(Self { object_id, report })
    }
}

/// Typed decode result, one variant per known service.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceTm {
    Verification(Service1Tm),
    Housekeeping(Service3Tm),
    Event(Service5Tm),
    Parameter(Service20Tm),
    ModeReply(Service200Tm),
    /// Services without specific fields (2, 8, 9, 17), unknown services and packets whose
    /// application data does not match the service layout.
    Generic,
}

impl ServiceTm {
    pub fn from_packet(tm: &PusTmReader) -> Self {
        let subservice = tm.subservice();
        let data = tm.user_data();
        let service = match PusServiceId::try_from(tm.service()) {
            Ok(service) => service,
            Err(_) => {
                log::warn!(
                    "service {} is not known, using the generic telemetry representation",
                    tm.service()
                );
                return Self::Generic;
            }
        };
        let typed = match service {
            PusServiceId::Verification => {
                Service1Tm::from_app_data(subservice, data).map(Self::Verification)
            }
            PusServiceId::Housekeeping => {
                Service3Tm::from_app_data(subservice, data).map(Self::Housekeeping)
            }
            PusServiceId::Event => Service5Tm::from_app_data(subservice, data).map(Self::Event),
            PusServiceId::Parameter => read_u32(data, 0).map(|parameter_id| {
                Self::Parameter(Service20Tm {
                    parameter_id,
                    payload: data[4..].to_vec(),
                })
            }),
            PusServiceId::Mode => {
                Service200Tm::from_app_data(subservice, data).map(Self::ModeReply)
            }
            PusServiceId::DeviceAccess
            | PusServiceId::Action
            | PusServiceId::Time
            | PusServiceId::Test => return Self::Generic,
        };
        typed.unwrap_or_else(|| {
            log::warn!(
                "application data of TM[{},{}] too short for its service layout",
                tm.service(),
                subservice
            );
            Self::Generic
        })
    }

    /// Short description used by the printer.
    pub fn print_info(tm: &PusTmReader, service_tm: &ServiceTm) -> String {
        match service_tm {
            Self::Verification(service1) => service1.report.description().to_string(),
            Self::Housekeeping(_) => "Housekeeping Packet".to_string(),
            Self::Event(event) => match event.severity {
                Some(Severity::Info) => "Event Info".to_string(),
                Some(Severity::Low) => "Event Error Low Severity".to_string(),
                Some(Severity::Medium) => "Event Error Med Severity".to_string(),
                Some(Severity::High) => "Event Error High Severity".to_string(),
                None => "Event".to_string(),
            },
            Self::Parameter(_) => "Parameter Management Reply".to_string(),
            Self::ModeReply(mode) => match mode.report {
                ModeReport::ModeReached { .. } => "Mode Reply: Mode reached".to_string(),
                ModeReport::WrongMode { .. } => "Mode Reply: Wrong Mode".to_string(),
                ModeReport::CantReachMode { .. } => "Mode Reply: Can't reach mode".to_string(),
                ModeReport::Other => "Mode Reply".to_string(),
            },
            Self::Generic => match PusServiceId::try_from(tm.service()) {
                Ok(PusServiceId::DeviceAccess) => "Raw Commanding Reply".to_string(),
                Ok(PusServiceId::Action) => "Functional Commanding Reply".to_string(),
                Ok(PusServiceId::Time) => "Time Service Reply".to_string(),
                Ok(PusServiceId::Test) => "Test Reply".to_string(),
                _ => format!("Telemetry of service {}", tm.service()),
            },
        }
    }

    /// Service specific column headers, appended to the generic packet columns.
    pub fn column_headers(&self) -> Vec<&'static str> {
        match self {
            Self::Verification(service1) => {
                let mut headers = vec!["TC Packet ID", "TC SSC"];
                match service1.report {
                    VerificationReport::StepSuccess { .. } => headers.push("Step Number"),
                    VerificationReport::StepFailure { .. } => headers.extend([
                        "Step Number",
                        "Return Value",
                        "Error Param 1",
                        "Error Param 2",
                    ]),
                    _ if service1.report.is_failure() => {
                        headers.extend(["Return Value", "Error Param 1", "Error Param 2"])
                    }
                    _ => (),
                }
                headers
            }
            Self::Housekeeping(_) => vec!["SID", "HK Data Size"],
            Self::Event(_) => vec!["Event ID", "Reporter ID", "Parameter 1", "Parameter 2"],
            Self::Parameter(_) => vec!["Parameter ID"],
            Self::ModeReply(mode) => match mode.report {
                ModeReport::CantReachMode { .. } => vec!["Object ID", "Return Value"],
                ModeReport::ModeReached { .. } | ModeReport::WrongMode { .. } => {
                    vec!["Object ID", "Mode", "Submode"]
                }
                ModeReport::Other => vec!["Object ID"],
            },
            Self::Generic => vec![],
        }
    }

    pub fn column_content(&self) -> Vec<String> {
        match self {
            Self::Verification(service1) => {
                let mut content = vec![
                    format!("{:#06x}", service1.tc_packet_id),
                    service1.tc_ssc.to_string(),
                ];
                if let VerificationReport::StepSuccess { step }
                | VerificationReport::StepFailure { step, .. } = service1.report
                {
                    content.push(step.to_string());
                }
                if let Some(failure) = service1.report.failure_data() {
                    content.push(format!("{:#06x}", failure.error_code));
                    content.push(format!("{:#x}, {}", failure.param1, failure.param1));
                    content.push(format!("{:#x}, {}", failure.param2, failure.param2));
                }
                content
            }
            Self::Housekeeping(service3) => vec![
                format!("{:#010x}", service3.sid),
                service3.param_len().to_string(),
            ],
            Self::Event(event) => vec![
                event.event_id.to_string(),
                format!("{:#010x}", event.reporter_id),
                format!("{:#x}, {}", event.param1, event.param1),
                format!("{:#x}, {}", event.param2, event.param2),
            ],
            Self::Parameter(param) => vec![format!("{:#010x}", param.parameter_id)],
            Self::ModeReply(mode) => {
                let mut content = vec![format!("{:#010x}", mode.object_id)];
                match mode.report {
                    ModeReport::CantReachMode { return_code } => {
                        content.push(format!("{:#06x}", return_code))
                    }
                    ModeReport::ModeReached { mode, submode }
                    | ModeReport::WrongMode { mode, submode } => {
                        content.push(mode.to_string());
                        content.push(submode.to_string());
                    }
                    ModeReport::Other => (),
                }
                content
            }
            Self::Generic => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tc::PusTcCreator;

    fn decode(creator: PusTmCreator) -> (PusTmReader, ServiceTm) {
        let reader = PusTmReader::decode(&creator.to_vec().unwrap()).unwrap();
        assert!(reader.is_valid());
        let service_tm = ServiceTm::from_packet(&reader);
        (reader, service_tm)
    }

    #[test]
    fn test_verification_success() {
        let tc_info = PusTcCreator::new(0x73, 17, 1, 1700, &[]).unwrap().info();
        let (_, service_tm) = decode(Service1Tm::creator(
            0x73,
            0,
            &tc_info,
            subservices::TM_ACCEPTANCE_SUCCESS,
            None,
        ));
        assert_eq!(
            service_tm,
            ServiceTm::Verification(Service1Tm {
                tc_packet_id: 0x1873,
                tc_ssc: 1700,
                report: VerificationReport::AcceptanceSuccess
            })
        );
    }

    #[test]
    fn test_verification_failures() {
        let tc_info = PusTcCreator::new(0x73, 17, 129, 2010, &[])
            .unwrap()
            .info();
        let failure = FailureData {
            error_code: 0x1A02,
            param1: 5,
            param2: 0xDEADBEEF,
        };
        let (reader, service_tm) = decode(Service1Tm::creator(
            0x73,
            1,
            &tc_info,
            subservices::TM_COMPLETION_FAILURE,
            Some(failure),
        ));
        let ServiceTm::Verification(service1) = &service_tm else {
            panic!("unexpected decode result {service_tm:?}");
        };
        assert_eq!(service1.report, VerificationReport::CompletionFailure(failure));
        assert!(service1.report.is_failure());
        assert_eq!(
            service_tm.column_headers().len(),
            service_tm.column_content().len()
        );
        assert_eq!(
            ServiceTm::print_info(&reader, &service_tm),
            "Failure Verification : Completion failure"
        );

        // Step failure has the step number in front of the error code.
        let mut app_data = vec![0x18, 0x73, 0xC7, 0xDA, 3];
        app_data.extend_from_slice(&0x1A02_u16.to_be_bytes());
        app_data.extend_from_slice(&5_u32.to_be_bytes());
        app_data.extend_from_slice(&0xDEADBEEF_u32.to_be_bytes());
        let service1 = Service1Tm::from_app_data(subservices::TM_STEP_FAILURE, &app_data).unwrap();
        assert_eq!(service1.tc_ssc, 2010);
        assert_eq!(
            service1.report,
            VerificationReport::StepFailure { step: 3, failure }
        );
    }

    #[test]
    fn test_event() {
        let event = Service5Tm {
            severity: Some(Severity::Medium),
            event_id: 7401,
            reporter_id: 0x4400AFFE,
            param1: 1,
            param2: 2,
        };
        let (_, service_tm) = decode(Service5Tm::creator(0x73, 5, Severity::Medium, &event));
        assert_eq!(service_tm, ServiceTm::Event(event));
    }

    #[test]
    fn test_hk_definition() {
        let mut app_data = 0x4300_u32.to_be_bytes().to_vec();
        app_data.push(1);
        app_data.extend_from_slice(&2.0_f32.to_be_bytes());
        app_data.push(2);
        app_data.extend_from_slice(&0x01010102_u32.to_be_bytes());
        app_data.extend_from_slice(&0x02020204_u32.to_be_bytes());
        let (_, service_tm) = decode(PusTmCreator::new(0x73, 3, 10, 0, app_data));
        assert_eq!(
            service_tm,
            ServiceTm::Housekeeping(Service3Tm {
                sid: TEST_SID,
                content: HkContent::Definition {
                    reporting_enabled: true,
                    collection_interval: 2.0,
                    pool_ids: vec![0x01010102, 0x02020204]
                }
            })
        );
    }

    #[test]
    fn test_hk_test_set() {
        let mut app_data = 0x4300_u32.to_be_bytes().to_vec();
        app_data.extend_from_slice(&[1, 42]);
        app_data.extend_from_slice(&1000_u16.to_be_bytes());
        app_data.extend_from_slice(&100_000_u32.to_be_bytes());
        app_data.extend_from_slice(&1.5_f32.to_be_bytes());
        app_data.extend_from_slice(&(-2.5_f32).to_be_bytes());
        app_data.push(0b1011_1100);
        let (_, service_tm) = decode(PusTmCreator::new(0x73, 3, 25, 0, app_data));
        let ServiceTm::Housekeeping(service3) = service_tm else {
            panic!("expected HK packet");
        };
        assert_eq!(service3.param_len(), 17);
        let HkContent::Data { data_set, .. } = service3.content else {
            panic!("expected HK data");
        };
        assert_eq!(
            data_set.validity_flags(),
            vec![true, false, true, true, true, true]
        );
        assert_eq!(data_set.column_content()[2], "1000");
        assert_eq!(data_set.column_content()[5], "-2.5");
    }

    #[test]
    fn test_mode_replies() {
        let mut app_data = 0x4400AFFE_u32.to_be_bytes().to_vec();
        app_data.extend_from_slice(&2_u32.to_be_bytes());
        app_data.push(0);
        let (_, service_tm) = decode(PusTmCreator::new(0x73, 200, 6, 0, app_data));
        assert_eq!(
            service_tm,
            ServiceTm::ModeReply(Service200Tm {
                object_id: 0x4400AFFE,
                report: ModeReport::ModeReached { mode: 2, submode: 0 }
            })
        );
        let mut app_data = 0x4400AFFE_u32.to_be_bytes().to_vec();
        app_data.extend_from_slice(&0x3A01_u16.to_be_bytes());
        let (_, service_tm) = decode(PusTmCreator::new(0x73, 200, 7, 0, app_data));
        assert_eq!(
            service_tm,
            ServiceTm::ModeReply(Service200Tm {
                object_id: 0x4400AFFE,
                report: ModeReport::CantReachMode {
                    return_code: 0x3A01
                }
            })
        );
    }

    #[test]
    fn test_generic_fallbacks() {
        let (reader, service_tm) = decode(PusTmCreator::new(0x73, 17, 2, 0, vec![]));
        assert_eq!(service_tm, ServiceTm::Generic);
        assert_eq!(ServiceTm::print_info(&reader, &service_tm), "Test Reply");
        // Unknown service.
        let (_, service_tm) = decode(PusTmCreator::new(0x73, 123, 1, 0, vec![1, 2]));
        assert_eq!(service_tm, ServiceTm::Generic);
        // Known service, truncated application data.
        let (_, service_tm) = decode(PusTmCreator::new(0x73, 5, 1, 0, vec![0, 1, 2]));
        assert_eq!(service_tm, ServiceTm::Generic);
    }

    #[test]
    fn test_parameter_reply() {
        let mut app_data = 7_u32.to_be_bytes().to_vec();
        app_data.extend_from_slice(&42_u32.to_be_bytes());
        let (_, service_tm) = decode(PusTmCreator::new(0x73, 20, 130, 0, app_data));
        assert_eq!(
            service_tm,
            ServiceTm::Parameter(Service20Tm {
                parameter_id: 7,
                payload: 42_u32.to_be_bytes().to_vec()
            })
        );
    }
}
