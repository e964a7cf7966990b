use anyhow::Result;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::utils::find_char_boundary;

#[derive(Debug, Clone)]
pub struct Logger {
    log_file: PathBuf,
}

#[derive(Debug, Default, Clone)]
pub struct SessionMetrics {
    pub chat_requests: usize,
    pub chat_replies: usize,
    pub chat_failures: usize,
    pub refreshes: usize,
    pub refresh_failures: usize,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_rate(&self) -> f64 {
        if self.chat_requests == 0 {
            return 0.0;
        }
        (self.chat_replies as f64 / self.chat_requests as f64) * 100.0
    }

    pub fn display(&self) {
        use colored::Colorize;
        println!("\n{}", "━━━━━━━━━ Session Statistics ━━━━━━━━━".bright_cyan().bold());
        println!("Chat requests: {}", self.chat_requests);
        println!("Replies: {}", self.chat_replies.to_string().green());
        println!("Failed replies: {}", self.chat_failures.to_string().red());
        println!("Data refreshes: {}", self.refreshes);
        println!("Failed refreshes: {}", self.refresh_failures.to_string().yellow());
        println!("Reply rate: {:.1}%", self.reply_rate());
        println!("{}", "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━".bright_cyan());
    }
}

impl Logger {
    pub fn new(log_dir: &str) -> Result<Self> {
        let dir = PathBuf::from(log_dir);
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_file = dir.join(format!("session_{}.log", timestamp));

        Ok(Self { log_file })
    }

    pub fn log(&self, message: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)?;

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(file, "[{}] {}", timestamp, message)?;
        Ok(())
    }

    pub fn log_chat_request(&self, message: &str) -> Result<()> {
        self.log(&format!("CHAT REQUEST: {}", message))
    }

    pub fn log_chat_response(&self, response: &str) -> Result<()> {
        let preview = if response.len() > 200 {
            format!("{}...", &response[..find_char_boundary(response, 200)])
        } else {
            response.to_string()
        };
        self.log(&format!("CHAT RESPONSE: {}", preview))
    }

    pub fn log_refresh(&self, silent: bool, success: bool, detail: &str) -> Result<()> {
        let kind = if silent { "SILENT" } else { "MANUAL" };
        let status = if success { "OK" } else { "FAILED" };
        self.log(&format!("REFRESH {} {}: {}", kind, status, detail))
    }

    pub fn log_error(&self, error: &str) -> Result<()> {
        self.log(&format!("ERROR: {}", error))
    }
}
