//! Card table backups — binary protobuf frames.
//!
//! Storage format: length-prefixed protobuf frames.
//!   [4-byte LE length][ProtoBackupHeader][4-byte LE length][ProtoCard]...
//!
//! Rules:
//!   - One file per backup, `backup_NNNNNN.cards`, never overwritten
//!   - fsync before the backup is reported as written
//!   - Header carries the card count and the canonical table hash;
//!     both are verified on read

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use prost::Message;
use thiserror::Error;
use tracing::info;

use card_kernel::hashing::table_hash;
use card_kernel::{Card, TEMPLATE_VERSION};

use crate::proto_bridge::{card_to_proto, proto_to_card};
use crate::proto_types::{ProtoBackupHeader, ProtoCard};

pub const BACKUP_FORMAT_VERSION: u32 = 1;

const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt backup: {0}")]
    Corrupt(String),
    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("unsupported backup format version {0}")]
    Version(u32),
    #[error("backup written under template version {found}, this build uses {expected}")]
    TemplateVersion { found: u32, expected: u32 },
    #[error("backup hash mismatch: header {expected}, content {actual}")]
    HashMismatch { expected: String, actual: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub sequence: u64,
    pub card_count: usize,
    pub table_hash: String,
}

/// Write the given table to the next free backup file in `dir`.
pub fn write_backup(dir: &Path, cards: &[Card]) -> Result<BackupInfo, BackupError> {
    fs::create_dir_all(dir)?;
    let sequence = latest_sequence(dir)?.map_or(1, |s| s + 1);
    let path = dir.join(backup_file_name(sequence));

    let header = ProtoBackupHeader {
        format_version: BACKUP_FORMAT_VERSION,
        template_version: TEMPLATE_VERSION,
        card_count: cards.len() as u64,
        table_hash: table_hash(cards),
    };

    let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
    let mut writer = BufWriter::new(file);
    write_frame(&mut writer, &header.encode_to_vec())?;
    for card in cards {
        write_frame(&mut writer, &card_to_proto(card).encode_to_vec())?;
    }
    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;

    info!(path = %path.display(), cards = cards.len(), "backup written");
    Ok(BackupInfo {
        path,
        sequence,
        card_count: cards.len(),
        table_hash: header.table_hash,
    })
}

/// Read and verify a backup file.
pub fn read_backup(path: &Path) -> Result<Vec<Card>, BackupError> {
    let mut reader = BufReader::new(File::open(path)?);

    let header_frame =
        read_frame(&mut reader)?.ok_or_else(|| BackupError::Corrupt("empty file".into()))?;
    let header = ProtoBackupHeader::decode(header_frame.as_slice())?;
    if header.format_version != BACKUP_FORMAT_VERSION {
        return Err(BackupError::Version(header.format_version));
    }
    if header.template_version != TEMPLATE_VERSION {
        return Err(BackupError::TemplateVersion {
            found: header.template_version,
            expected: TEMPLATE_VERSION,
        });
    }

    let mut cards = Vec::new();
    while let Some(frame) = read_frame(&mut reader)? {
        let proto = ProtoCard::decode(frame.as_slice())?;
        cards.push(proto_to_card(&proto).map_err(BackupError::Corrupt)?);
    }

    if cards.len() as u64 != header.card_count {
        return Err(BackupError::Corrupt(format!(
            "header announces {} cards, found {}",
            header.card_count,
            cards.len()
        )));
    }
    let actual = table_hash(&cards);
    if actual != header.table_hash {
        return Err(BackupError::HashMismatch {
            expected: header.table_hash,
            actual,
        });
    }
    Ok(cards)
}

/// Path of the highest-numbered backup in `dir`, if any.
pub fn latest_backup(dir: &Path) -> io::Result<Option<PathBuf>> {
    Ok(latest_sequence(dir)?.map(|s| dir.join(backup_file_name(s))))
}

fn backup_file_name(sequence: u64) -> String {
    format!("backup_{:06}.cards", sequence)
}

fn latest_sequence(dir: &Path) -> io::Result<Option<u64>> {
    if !dir.exists() {
        return Ok(None);
    }
    let mut best: Option<u64> = None;
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let seq = name
            .to_string_lossy()
            .strip_prefix("backup_")
            .and_then(|s| s.strip_suffix(".cards"))
            .and_then(|s| s.parse::<u64>().ok());
        if let Some(seq) = seq {
            best = Some(best.map_or(seq, |b| b.max(seq)));
        }
    }
    Ok(best)
}

fn write_frame<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    let len = bytes.len() as u32;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(bytes)
}

/// `Ok(None)` at a clean end of file.
fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, BackupError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(BackupError::Corrupt(format!("invalid frame length: {}", len)));
    }
    let mut frame = vec![0u8; len];
    reader
        .read_exact(&mut frame)
        .map_err(|e| BackupError::Corrupt(format!("truncated frame: {}", e)))?;
    Ok(Some(frame))
}
