//! Local records of the pledges a node takes part in.

use interop_core::driver::{PledgeInfo, PledgeVault};
use interop_core::error::{InteropError, Result};
use interop_core::id::{PledgeId, TokenId};
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

/// Pledge records kept in memory
#[derive(Debug, Default)]
pub struct InMemoryPledgeVault {
    records: RwLock<Vec<PledgeInfo>>,
}

impl InMemoryPledgeVault {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<PledgeInfo>>> {
        self.records
            .read()
            .map_err(|_| InteropError::Other("pledge vault lock poisoned".to_string()))
    }
}

impl PledgeVault for InMemoryPledgeVault {
    /// Storing the same pledge again replaces the earlier record
    fn store(&self, info: &PledgeInfo) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| InteropError::Other("pledge vault lock poisoned".to_string()))?;
        records.retain(|r| !(r.token_id == info.token_id && r.script.id == info.script.id));
        records.push(info.clone());
        debug!("stored pledge {} of token {}", info.script.id, info.token_id);
        Ok(())
    }

    fn pledge_by_token_id(&self, token_id: &TokenId) -> Result<Vec<PledgeInfo>> {
        Ok(self
            .records()?
            .iter()
            .filter(|r| &r.token_id == token_id)
            .cloned()
            .collect())
    }

    fn pledge_by_id(&self, pledge_id: &PledgeId) -> Result<Option<PledgeInfo>> {
        Ok(self.records()?.iter().find(|r| &r.script.id == pledge_id).cloned())
    }
}

/// Pledge records journaled to a file and replayed when the vault is opened.
///
/// Each record is a bincode encoded [`PledgeInfo`] preceded by its length as
/// a little-endian `u64`.
pub struct FilePledgeVault {
    path: PathBuf,
    file: Mutex<BufWriter<File>>,
    memory: InMemoryPledgeVault,
}

impl FilePledgeVault {
    /// Open the journal at `path`, creating it if needed
    pub fn open(path: &Path) -> Result<Self> {
        let memory = InMemoryPledgeVault::new();
        let mut replayed = 0;
        if path.exists() {
            let mut reader = BufReader::new(File::open(path)?);
            while let Some(info) = read_record(&mut reader)? {
                memory.store(&info)?;
                replayed += 1;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("opened pledge vault {:?}, {} records replayed", path, replayed);
        Ok(FilePledgeVault {
            path: path.to_path_buf(),
            file: Mutex::new(BufWriter::new(file)),
            memory,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_record(reader: &mut impl Read) -> Result<Option<PledgeInfo>> {
    let mut len_buf = [0u8; 8];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let mut record = vec![0u8; u64::from_le_bytes(len_buf) as usize];
    reader.read_exact(&mut record)?;
    Ok(Some(bincode::deserialize(&record)?))
}

impl PledgeVault for FilePledgeVault {
    fn store(&self, info: &PledgeInfo) -> Result<()> {
        let record = bincode::serialize(info)?;
        {
            let mut file = self
                .file
                .lock()
                .map_err(|_| InteropError::Other("pledge journal lock poisoned".to_string()))?;
            file.write_all(&(record.len() as u64).to_le_bytes())?;
            file.write_all(&record)?;
            file.flush()?;
        }
        self.memory.store(info)
    }

    fn pledge_by_token_id(&self, token_id: &TokenId) -> Result<Vec<PledgeInfo>> {
        self.memory.pledge_by_token_id(token_id)
    }

    fn pledge_by_id(&self, pledge_id: &PledgeId) -> Result<Option<PledgeInfo>> {
        self.memory.pledge_by_id(pledge_id)
    }
}
