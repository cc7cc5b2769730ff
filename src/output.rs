use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::Serialize;

use crate::app::{DownloadReport, NormalizeReport};
use crate::config::Settings;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_download(report: &DownloadReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_normalize(report: &NormalizeReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_status(statuses: &BTreeMap<String, Option<String>>) -> io::Result<()> {
        Self::print_json(statuses)
    }

    pub fn print_synonyms(name: &str, synonyms: &[String]) -> io::Result<()> {
        #[derive(Serialize)]
        struct SynonymList<'a> {
            name: &'a str,
            synonyms: &'a [String],
        }
        Self::print_json(&SynonymList { name, synonyms })
    }

    pub fn print_settings(settings: &Settings) -> io::Result<()> {
        Self::print_json(settings)
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
