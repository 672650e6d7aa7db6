use rocksdb::{Options, DB, ColumnFamilyDescriptor};
use serde::{Serialize, de::DeserializeOwned};
use anyhow::{Result, Context};
use std::sync::Arc;

// Values are stored as JSON rather than a binary codec: the history
// partitions must stay inspectable and tolerate schema drift across
// application versions without a migration step.

/// Column family holding the per-(account, chain) transfer history.
pub const CF_HISTORY: &str = "history";

pub struct Store {
    pub db: DB,
    path: String,
}

impl Store {
    /// Perform database health check.
    pub fn health_check(&self) -> Result<()> {
        let test_key = b"health_check";
        self.db.put(test_key, b"ok").with_context(|| "Database write test failed")?;
        let value = self.db.get(test_key).with_context(|| "Database read test failed")?;
        if value.as_deref() != Some(b"ok") {
            anyhow::bail!("Database read/write consistency check failed");
        }
        self.db.delete(test_key).with_context(|| "Database delete test failed")?;
        Ok(())
    }

    pub fn open(base_path: &str) -> Result<Self> {
        let db_path = base_path.to_string();

        let cf_names = ["default", CF_HISTORY];

        let cf_opts = Options::default();
        let cf_descriptors: Vec<ColumnFamilyDescriptor> = cf_names
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, cf_opts.clone()))
            .collect();

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(256);

        std::fs::create_dir_all(&db_path).ok();

        let db = DB::open_cf_descriptors(&db_opts, &db_path, cf_descriptors)
            .with_context(|| format!("Failed to open database at '{db_path}'"))?;

        let store = Store { db, path: db_path };

        store
            .health_check()
            .with_context(|| "Database health check failed during initialization")?;

        Ok(store)
    }

    pub fn put<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let data = serde_json::to_vec(value)
            .with_context(|| format!("Failed to serialize value for key '{key:?}' in CF '{cf}'"))?;

        let handle = self.db.cf_handle(cf)
            .ok_or_else(|| anyhow::anyhow!("Column family '{}' not found", cf))?;

        self.db
            .put_cf(handle, key, &data)
            .with_context(|| format!("Failed to PUT to database for key '{key:?}' in CF '{cf}'"))?;
        Ok(())
    }

    pub fn get<T: DeserializeOwned + 'static>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let handle = self.db.cf_handle(cf)
            .ok_or_else(|| anyhow::anyhow!("Column family '{}' not found", cf))?;

        match self.db.get_cf(handle, key)? {
            Some(value) => match serde_json::from_slice(&value) {
                Ok(deser) => Ok(Some(deser)),
                Err(_) => Err(anyhow::anyhow!(
                    "Failed to deserialize value for key '{:?}' in CF '{}'",
                    key, cf
                )),
            },
            None => Ok(None),
        }
    }

    /// Fetch raw bytes without attempting to deserialize.
    pub fn get_raw_bytes(&self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let handle = self.db.cf_handle(cf)
            .ok_or_else(|| anyhow::anyhow!("Column family '{}' not found", cf))?;
        Ok(self.db.get_cf(handle, key)?.map(|v| v.to_vec()))
    }

    /// Force flush all memtables to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush().with_context(|| "Failed to flush database")
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

pub fn open(cfg: &crate::config::Storage) -> Result<Arc<Store>> {
    let store = Store::open(&cfg.path).with_context(|| {
        format!(
            "database failed to open at '{}'; check the directory is writable and no other instance is running",
            cfg.path
        )
    })?;
    Ok(Arc::new(store))
}
