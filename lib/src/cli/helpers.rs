// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::io::{BufRead, Write};

use async_trait::async_trait;
use log::info;

use qrsign_core::router::{Confirm, Prompt};

/// Confirmation via the controlling terminal
#[derive(Clone, Debug)]
pub struct TerminalConfirm {
    /// Accept all prompts without asking
    pub assume_yes: bool,
}

#[async_trait]
impl Confirm for TerminalConfirm {
    async fn confirm(&self, prompt: Prompt) -> bool {
        if self.assume_yes {
            info!("{}: {} (accepted)", prompt.title, prompt.message);
            return true;
        }

        tokio::task::spawn_blocking(move || ask(&prompt))
            .await
            .unwrap_or(false)
    }
}

fn ask(prompt: &Prompt) -> bool {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{}\n{}\n[y/N]: ", prompt.title, prompt.message);
    let _ = stderr.flush();

    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => matches!(line.trim(), "y" | "Y" | "yes"),
        Err(_) => false,
    }
}
