//! savecli: thin command-line front over the save engine.
//!
//! Drives the same async pipeline the FFI exposes: build a request, submit,
//! wait for the single completion callback, print the outcome (plain text
//! or JSON with --json).

use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use crate::config::SaveConfig;
use crate::engine::{SaveEngine, SaveRequest};
use crate::resolve::ConflictMode;

#[derive(Parser)]
#[command(name = "savecli", version, about = "Save a byte buffer through the bytedrop engine")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Save bytes from a file (or stdin) under the root directory.
    Save {
        /// Writable root directory (created if missing).
        #[arg(long)]
        root: PathBuf,
        /// Base file name, without extension.
        #[arg(long)]
        name: String,
        /// Extension without the dot; empty for none.
        #[arg(long, default_value = "")]
        ext: String,
        /// Relative sub-directory under the root.
        #[arg(long, default_value = "")]
        sub_dir: String,
        /// Conflict policy when the target already exists.
        #[arg(long, value_enum, default_value_t = ModeArg::AutoRename)]
        mode: ModeArg,
        /// Advisory mime type (recorded, never enforced).
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
        /// Input file; stdin when omitted.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Print the result envelope as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    AutoRename,
    Overwrite,
    Fail,
    Skip,
}

impl ModeArg {
    fn to_mode(self) -> ConflictMode {
        match self {
            ModeArg::AutoRename => ConflictMode::AutoRename,
            ModeArg::Overwrite => ConflictMode::Overwrite,
            ModeArg::Fail => ConflictMode::Fail,
            ModeArg::Skip => ConflictMode::Skip,
        }
    }
}

/// JSON projection of the result envelope.
#[derive(Serialize)]
struct Report {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Save {
            root,
            name,
            ext,
            sub_dir,
            mode,
            mime,
            input,
            json,
        } => cmd_save(root, name, ext, sub_dir, mode, mime, input, json),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_save(
    root: PathBuf,
    name: String,
    ext: String,
    sub_dir: String,
    mode: ModeArg,
    mime: String,
    input: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let data = match &input {
        Some(p) => fs::read(p).with_context(|| format!("read input {}", p.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("read stdin")?;
            buf
        }
    };

    let engine = SaveEngine::new(&root, SaveConfig::from_env())?;

    let request = SaveRequest::new(data, name)
        .with_extension(ext)
        .with_mime_type(mime)
        .with_sub_dir(sub_dir)
        .with_conflict_mode(mode.to_mode());

    let (tx, rx) = mpsc::channel();
    engine.submit(request, move |outcome| {
        let _ = tx.send(outcome);
    });
    let outcome = rx.recv().context("engine dropped the completion callback")?;

    match outcome {
        Ok(saved) => {
            if json {
                let report = Report {
                    success: true,
                    file_path: Some(saved.path.display().to_string()),
                    file_uri: Some(saved.uri),
                    error_code: None,
                    error_message: None,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("saved: {}", saved.path.display());
                println!("uri:   {}", saved.uri);
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let report = Report {
                    success: false,
                    file_path: None,
                    file_uri: None,
                    error_code: Some(e.code().to_string()),
                    error_message: Some(e.message().to_string()),
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Err(anyhow!("save failed: {}", e))
        }
    }
}
