use std::thread;

use chrono::{format::DelayedFormat, DateTime, Local};
use concat_string::concat_string;
use crossbeam_channel::{unbounded, Sender};
use once_cell::sync::Lazy;

use crate::logging::rotate::Rotate;

pub mod rotate;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("default"));

/// 批次寫檔時累積的字元上限
const FLUSH_THRESHOLD: usize = 4096;

pub struct Logger {
    info_writer: Sender<LogMessage>,
    warn_writer: Sender<LogMessage>,
    error_writer: Sender<LogMessage>,
    debug_writer: Sender<LogMessage>,
}

struct LogMessage {
    msg: String,
    created_at: DateTime<Local>,
}

impl Logger {
    pub(crate) fn new(log_name: &str) -> Self {
        Logger {
            info_writer: Self::create_writer(&format!("{}_info", log_name)),
            warn_writer: Self::create_writer(&format!("{}_warn", log_name)),
            error_writer: Self::create_writer(&format!("{}_error", log_name)),
            debug_writer: Self::create_writer(&format!("{}_debug", log_name)),
        }
    }

    pub(crate) fn info(&self, log: String) {
        self.send(log, &self.info_writer);
    }

    pub(crate) fn warn(&self, log: String) {
        self.send(log, &self.warn_writer);
    }

    pub(crate) fn error(&self, log: String) {
        self.send(log, &self.error_writer);
    }

    pub(crate) fn debug(&self, log: String) {
        self.send(log, &self.debug_writer);
    }

    fn send(&self, msg: String, writer: &Sender<LogMessage>) {
        let message = LogMessage {
            msg,
            created_at: Local::now(),
        };

        if let Err(why) = writer.send(message) {
            error_console(why.to_string());
        }
    }

    fn create_writer(log_name: &str) -> Sender<LogMessage> {
        let (tx, rx) = unbounded::<LogMessage>();
        let mut rotate = Rotate::new(format!("log/%Y-%m-%d_{}.log", log_name));

        // 寫入檔案的操作使用另一個線程處理
        thread::spawn(move || {
            let mut together = String::with_capacity(FLUSH_THRESHOLD);

            while let Ok(received) = rx.recv() {
                let now = received.created_at;
                append_line(&mut together, &received);

                if rx.is_empty() || together.len() >= FLUSH_THRESHOLD {
                    flush_line(&mut rotate, now, &mut together);
                }
            }

            flush_line(&mut rotate, Local::now(), &mut together);
        });

        tx
    }
}

fn append_line(line: &mut String, message: &LogMessage) {
    line.push_str(
        concat_string!(
            message.created_at.format("%F %X%.6f").to_string(),
            " ",
            message.msg,
            "\r\n"
        )
        .as_str(),
    );
}

fn flush_line(rotate: &mut Rotate, now: DateTime<Local>, line: &mut String) {
    if line.is_empty() {
        return;
    }

    if let Err(why) = rotate.write_msg(now, line.as_bytes()) {
        error_console(format!(
            "Failed to write to log file. because:{:#?}\r\nmsg:{}",
            why, line
        ));
    }

    rotate.flush();
    line.clear();
}

pub fn info_file_async(log: String) {
    LOGGER.info(log);
}

pub fn warn_file_async(log: String) {
    LOGGER.warn(log);
}

pub fn error_file_async(log: String) {
    LOGGER.error(log);
}

pub fn debug_file_async(log: String) {
    LOGGER.debug(log);
}

pub fn info_console(log: String) {
    println!(
        "{} Info {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: String) {
    println!(
        "{} Error {}",
        DelayedFormat::to_string(&Local::now().format("%Y-%m-%d %H:%M:%S.%3f")),
        log
    );
}
