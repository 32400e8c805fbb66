// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only repayment journal
//!
//! Newline-delimited JSON with a CRC32 checksum per entry. The journal is
//! the audit trail of collected repayments; replay restores it after a
//! restart and a checksum mismatch flags a corrupted line instead of
//! silently loading bad money records.

use crate::error::StoreError;
use crate::traits::RepaymentRecord;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// A single journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Monotonically increasing sequence number
    pub sequence: u64,
    /// Microseconds since Unix epoch at append time
    pub timestamp_micros: u64,
    /// The repayment being recorded
    pub record: RepaymentRecord,
    /// CRC32 checksum of the serialized record
    pub checksum: u32,
}

impl JournalEntry {
    /// Create an entry with a computed checksum
    pub fn new(sequence: u64, record: RepaymentRecord) -> Self {
        let checksum = Self::calculate_checksum(&record);
        let timestamp_micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self {
            sequence,
            timestamp_micros,
            record,
            checksum,
        }
    }

    fn calculate_checksum(record: &RepaymentRecord) -> u32 {
        // RepaymentRecord only contains strings, decimals, and timestamps,
        // all of which serialize without error
        let json = serde_json::to_string(record).unwrap_or_else(|_| String::new());
        crc32fast::hash(json.as_bytes())
    }

    /// Verify the checksum matches the record
    pub fn verify(&self) -> bool {
        self.checksum == Self::calculate_checksum(&self.record)
    }

    /// Serialize to one line of JSON
    pub fn to_line(&self) -> Result<String, StoreError> {
        serde_json::to_string(self).map_err(StoreError::from)
    }

    /// Parse from a single line of JSON
    pub fn from_line(line: &str) -> Result<Self, StoreError> {
        serde_json::from_str(line).map_err(StoreError::from)
    }
}

/// Append-only journal of collected repayments
pub struct Journal {
    file: File,
    sequence: u64,
}

impl Journal {
    /// Open or create a journal at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        // Count existing entries to continue the sequence
        let reader = BufReader::new(File::open(path)?);
        let sequence = reader.lines().count() as u64;

        Ok(Self { file, sequence })
    }

    /// Append a repayment record, returning its sequence number
    pub fn append(&mut self, record: RepaymentRecord) -> Result<u64, StoreError> {
        self.sequence += 1;
        let entry = JournalEntry::new(self.sequence, record);
        let line = entry.to_line()?;
        writeln!(self.file, "{}", line)?;
        self.file.sync_all()?;
        Ok(self.sequence)
    }

    /// Current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Replay all entries from the journal, verifying checksums
    pub fn replay(path: &Path) -> Result<Vec<JournalEntry>, StoreError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let entry = JournalEntry::from_line(&line)?;
            if !entry.verify() {
                return Err(StoreError::Invalid(format!(
                    "journal checksum mismatch at line {}",
                    line_no + 1
                )));
            }
            entries.push(entry);
        }

        Ok(entries)
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
