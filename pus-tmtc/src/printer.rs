//! Console and file output of telecommands and telemetry.
//!
//! Every printed line goes to the logger and, if file output is enabled, into a file buffer
//! which can be exported with [TmTcPrinter::print_to_file].
use crate::config::TmtcConfig;
use crate::ecss::PusPacket;
use crate::listener::TmPacketQueue;
use crate::services::{subservices, HkContent, HkDataSet, ServiceTm};
use crate::tc::TcInfo;
use crate::tm::PusTmReader;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DisplayMode {
    Short,
    #[default]
    Long,
}

pub const DEFAULT_LOG_FILE: &str = "log/tmtc_log.txt";

/// Format bytes the way raw data is shown in the TMTC logs: `[0x1, 0xff]`.
pub fn data_string(data: &[u8]) -> String {
    let bytes: Vec<String> = data.iter().map(|byte| format!("{byte:#x}")).collect();
    format!("[{}]", bytes.join(", "))
}

#[derive(Debug, Clone)]
pub struct TmTcPrinter {
    display_mode: DisplayMode,
    print_to_file: bool,
    print_tc: bool,
    print_tm: bool,
    print_raw_tm: bool,
    print_hk: bool,
    print_buffer: String,
    file_buffer: String,
    file_buffer_list: Vec<String>,
}

impl TmTcPrinter {
    pub fn new(display_mode: DisplayMode, print_to_file: bool, print_tc: bool) -> Self {
        Self {
            display_mode,
            print_to_file,
            print_tc,
            print_tm: true,
            print_raw_tm: false,
            print_hk: false,
            print_buffer: String::new(),
            file_buffer: String::new(),
            file_buffer_list: Vec::new(),
        }
    }

    pub fn from_config(cfg: &TmtcConfig) -> Self {
        let mut printer = Self::new(cfg.display_mode, cfg.print_to_file, cfg.print_tc);
        printer.print_tm = cfg.print_tm;
        printer.print_raw_tm = cfg.print_raw_tm;
        printer.print_hk = cfg.print_hk;
        printer
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    pub fn file_buffer(&self) -> &str {
        &self.file_buffer
    }

    pub fn print_telemetry_queue(&mut self, tm_queue: &TmPacketQueue) {
        for tm_list in tm_queue {
            for tm in tm_list {
                self.print_telemetry(tm);
            }
        }
    }

    pub fn print_telemetry(&mut self, tm: &PusTmReader) {
        let service_tm = ServiceTm::from_packet(tm);
        match self.display_mode {
            DisplayMode::Short => {
                self.print_buffer = format!("Received TM[{},{}]", tm.service(), tm.subservice());
                self.emit();
            }
            DisplayMode::Long => {
                self.print_buffer = format!(
                    "Received Telemetry: {}",
                    ServiceTm::print_info(tm, &service_tm)
                );
                self.emit();
                let mut headers = tm.column_headers();
                headers.extend(service_tm.column_headers());
                self.print_buffer = format!("{headers:?}");
                self.emit();
                let mut content = tm.column_content();
                content.extend(service_tm.column_content());
                self.print_buffer = format!("{content:?}");
                self.emit();
            }
        }
        self.handle_wiretapping_packet(tm);
        self.handle_data_reply_packet(tm);
        if let ServiceTm::Housekeeping(service3) = &service_tm {
            if self.print_hk {
                match &service3.content {
                    HkContent::Definition {
                        reporting_enabled,
                        collection_interval,
                        pool_ids,
                    } => {
                        self.print_buffer = format!("HK Definition from SID {:#x} :", service3.sid);
                        self.emit();
                        let mut headers = vec![
                            "SID".to_string(),
                            "Report Status".to_string(),
                            "Collection Interval".to_string(),
                            "Number Of IDs".to_string(),
                        ];
                        headers.extend((1..=pool_ids.len()).map(|idx| format!("Pool ID {idx}")));
                        self.print_buffer = format!("{headers:?}");
                        self.emit();
                        let mut content = vec![
                            format!("{:#x}", service3.sid),
                            if *reporting_enabled { "On" } else { "Off" }.to_string(),
                            collection_interval.to_string(),
                            pool_ids.len().to_string(),
                        ];
                        content.extend(pool_ids.iter().map(|id| format!("{id:#x}")));
                        self.print_buffer = format!("{content:?}");
                        self.emit();
                    }
                    HkContent::Data { data_set, .. } => {
                        self.print_buffer = format!("HK Data from SID {:#x} :", service3.sid);
                        self.emit();
                        self.print_hk_data_set(data_set);
                    }
                    HkContent::Other => (),
                }
            }
        }
        if self.print_raw_tm {
            self.print_buffer = format!("TM Data:\n{}", data_string(tm.user_data()));
            self.emit();
        }
    }

    fn print_hk_data_set(&mut self, data_set: &HkDataSet) {
        self.print_buffer = format!("{:?}", data_set.column_headers());
        self.emit();
        self.print_buffer = format!("{:?}", data_set.column_content());
        self.emit();
        self.print_buffer = "Valid: ".to_string();
        self.emit();
        let flags: Vec<&str> = data_set
            .validity_flags()
            .iter()
            .map(|valid| if *valid { "Yes" } else { "No" })
            .collect();
        self.print_buffer = format!("[{}]", flags.join(", "));
        self.emit();
    }

    fn handle_wiretapping_packet(&mut self, tm: &PusTmReader) {
        if tm.service() == 2
            && (tm.subservice() == subservices::TM_WIRETAPPING_COMMAND
                || tm.subservice() == subservices::TM_WIRETAPPING_REPLY)
        {
            self.print_buffer = format!(
                "Wiretapping Packet or Raw Reply from TM [{},{}]: {}",
                tm.service(),
                tm.subservice(),
                data_string(tm.user_data())
            );
            self.emit();
        }
    }

    fn handle_data_reply_packet(&mut self, tm: &PusTmReader) {
        if tm.service() == 8 && tm.subservice() == subservices::TM_ACTION_DATA_REPLY {
            self.print_buffer = format!(
                "Service 8 Direct Command Reply TM[8,130] with TM data: {}",
                data_string(tm.user_data())
            );
            self.emit();
        }
    }

    pub fn print_telecommand(&mut self, raw_tc: &[u8], info: &TcInfo) {
        if !self.print_tc {
            return;
        }
        if raw_tc.is_empty() {
            log::error!("TMTC printer: empty packet was sent, configuration error");
            return;
        }
        self.print_buffer = match self.display_mode {
            DisplayMode::Short => format!(
                "Sent TC[{},{}] with SSC {}",
                info.service, info.subservice, info.ssc
            ),
            DisplayMode::Long => format!(
                "Telecommand TC[{},{}] with SSC {} sent with data {}",
                info.service,
                info.subservice,
                info.ssc,
                data_string(&info.data)
            ),
        };
        self.emit();
    }

    /// Print a string and add it to the file buffer. Setting `separate` surrounds the entry
    /// with blank lines in the file.
    pub fn print_string(&mut self, string: &str, separate: bool) {
        self.print_buffer = string.to_string();
        log::info!("{}", self.print_buffer);
        self.add_print_buffer_to_file_buffer(separate);
    }

    pub fn add_to_print_string(&mut self, string: &str) {
        self.print_buffer.push_str(string);
    }

    pub fn add_print_buffer_to_file_buffer(&mut self, separate: bool) {
        if !self.print_to_file {
            return;
        }
        if separate {
            self.file_buffer.push_str("\r\n");
        }
        self.file_buffer.push_str(&self.print_buffer);
        self.file_buffer.push_str("\r\n");
    }

    pub fn add_file_buffer_to_buffer_list(&mut self) {
        self.file_buffer_list.push(self.file_buffer.clone());
    }

    pub fn clear_file_buffer(&mut self) {
        self.file_buffer.clear();
    }

    fn emit(&mut self) {
        if self.print_tm {
            log::info!("{}", self.print_buffer);
        }
        self.add_print_buffer_to_file_buffer(false);
    }

    /// Write the file buffer to the given file, creating parent directories as required.
    pub fn print_to_file(
        &mut self,
        path: impl AsRef<Path>,
        clear_file_buffer: bool,
    ) -> io::Result<()> {
        let path = path.as_ref();
        create_parent_dir(path)?;
        fs::write(path, &self.file_buffer)?;
        if clear_file_buffer {
            self.file_buffer.clear();
        }
        log::info!("log file written to {}", path.display());
        Ok(())
    }

    /// Join all collected file buffers and write them to the given file.
    pub fn print_file_buffer_list_to_file(
        &mut self,
        path: impl AsRef<Path>,
        clear_list: bool,
    ) -> io::Result<()> {
        let path = path.as_ref();
        create_parent_dir(path)?;
        fs::write(path, self.file_buffer_list.concat())?;
        if clear_list {
            self.file_buffer_list.clear();
        }
        log::info!("log file written to {}", path.display());
        Ok(())
    }
}

fn create_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            log::info!("log directory does not exist, creating {}", parent.display());
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
