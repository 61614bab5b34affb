use anyhow::Result;
use chrono::Utc;
use log::{error, info, warn};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::Mutex;

/// Periodic filesystem snapshots of the sled directory. A snapshot is a
/// plain recursive copy; sled tolerates this because every handler flushes
/// after mutating.
pub struct BackupManager {
    db_path: PathBuf,
    backup_dir: PathBuf,
    name_template: String,
    lock: Arc<Mutex<()>>,
}

impl BackupManager {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        db_path: P,
        backup_dir: Q,
        name_template: &str,
    ) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            backup_dir: backup_dir.as_ref().to_path_buf(),
            name_template: name_template.to_string(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn run(self: Arc<Self>, interval: Duration, retention: usize) {
        tokio::fs::create_dir_all(&self.backup_dir).await.ok();
        loop {
            tokio::time::sleep(interval).await;

            let lock = self.lock.clone();
            // Give a stuck run five minutes before skipping this cycle
            let acquired = tokio::time::timeout(Duration::from_secs(300), lock.lock()).await;
            if acquired.is_err() {
                warn!("Backup skipped: previous backup still running");
                continue;
            }

            let mut last_err: Option<anyhow::Error> = None;
            for attempt in 1..=3 {
                match tokio::time::timeout(Duration::from_secs(180), self.snapshot(retention)).await
                {
                    Ok(Ok(())) => {
                        info!("Sled backup completed (attempt {} of 3)", attempt);
                        last_err = None;
                        break;
                    }
                    Ok(Err(e)) => {
                        warn!("Sled backup error on attempt {}: {}", attempt, e);
                        last_err = Some(e);
                    }
                    Err(_) => {
                        warn!("Sled backup timed out on attempt {}", attempt);
                        last_err = Some(anyhow::anyhow!("timeout"));
                    }
                }
            }
            if let Some(e) = last_err {
                error!("Sled backup failed after 3 attempts: {}", e);
            }
        }
    }

    async fn snapshot(&self, retention: usize) -> Result<()> {
        let ts = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let name = self.name_template.replace("{{timestamp}}", &ts);
        let src = self.db_path.clone();
        let dst = self.backup_dir.join(name);
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dst)?;
            copy_dir_recursive_sync(&src, &dst)
        })
        .await??;
        self.prune_old_backups(retention).await?;
        Ok(())
    }

    fn name_prefix(&self) -> String {
        self.name_template
            .split("{{timestamp}}")
            .next()
            .unwrap_or_default()
            .to_string()
    }

    /// Backup directories matching our name template, oldest first. The
    /// timestamp sits in the name, so lexicographic order is temporal order.
    async fn scan_backups(&self) -> Result<Vec<PathBuf>> {
        let prefix = self.name_prefix();
        let mut entries = tokio::fs::read_dir(&self.backup_dir).await?;
        let mut items: Vec<(String, PathBuf)> = Vec::new();
        while let Some(e) = entries.next_entry().await? {
            let name = e.file_name().to_string_lossy().to_string();
            if !prefix.is_empty() && !name.starts_with(&prefix) {
                continue;
            }
            if let Ok(md) = e.metadata().await {
                if md.is_dir() {
                    items.push((name, e.path()));
                }
            }
        }
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(items.into_iter().map(|(_, p)| p).collect())
    }

    async fn prune_old_backups(&self, keep: usize) -> Result<()> {
        let items = self.scan_backups().await?;
        let remove_count = items.len().saturating_sub(keep);
        for path in items.iter().take(remove_count) {
            let _ = tokio::fs::remove_dir_all(path).await;
        }
        Ok(())
    }

    pub async fn get_latest_backup(&self) -> Result<Option<PathBuf>> {
        match self.scan_backups().await {
            Ok(items) => Ok(items.into_iter().last()),
            Err(err) => {
                warn!("Failed to read backup directory: {}", err);
                Ok(None)
            }
        }
    }

    /// Copy the newest snapshot over the database path. Only runs when the
    /// database directory is missing or empty; a populated directory wins
    /// over any backup. Returns whether a restore happened.
    pub async fn restore_from_latest(&self) -> Result<bool> {
        let backup_path = match self.get_latest_backup().await? {
            Some(path) => path,
            None => {
                info!("No backups found to restore from");
                return Ok(false);
            }
        };

        if dir_has_entries(&self.db_path).await {
            info!("Database already has data, skipping restore");
            return Ok(false);
        }

        tokio::fs::create_dir_all(&self.db_path).await?;

        let src = backup_path.clone();
        let dst = self.db_path.clone();
        tokio::task::spawn_blocking(move || copy_dir_recursive_sync(&src, &dst)).await??;

        info!("Database restored from backup: {:?}", backup_path);
        Ok(true)
    }
}

async fn dir_has_entries(path: &Path) -> bool {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(_) => false,
    }
}

fn copy_dir_recursive_sync(src: &Path, dst: &Path) -> Result<(), std::io::Error> {
    for entry_res in std::fs::read_dir(src)? {
        let entry = entry_res?;
        let ty = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if ty.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive_sync(&src_path, &dst_path)?;
        } else if ty.is_file() {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fake_backup(root: &Path, name: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("db"), name.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn latest_backup_is_newest_by_name() {
        let root = tempdir().unwrap();
        fake_backup(root.path(), "app_backup_20240101T000000Z");
        fake_backup(root.path(), "app_backup_20240301T000000Z");
        fake_backup(root.path(), "app_backup_20240201T000000Z");
        fake_backup(root.path(), "unrelated_dir");

        let mgr = BackupManager::new("unused", root.path(), "app_backup_{{timestamp}}");
        let latest = mgr.get_latest_backup().await.unwrap().unwrap();
        assert!(latest.ends_with("app_backup_20240301T000000Z"));
    }

    #[tokio::test]
    async fn prune_keeps_only_newest() {
        let root = tempdir().unwrap();
        for day in 1..=5 {
            fake_backup(root.path(), &format!("app_backup_2024010{}T000000Z", day));
        }

        let mgr = BackupManager::new("unused", root.path(), "app_backup_{{timestamp}}");
        mgr.prune_old_backups(2).await.unwrap();

        let remaining = mgr.scan_backups().await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining[0].ends_with("app_backup_20240104T000000Z"));
        assert!(remaining[1].ends_with("app_backup_20240105T000000Z"));
    }

    #[tokio::test]
    async fn restore_fills_empty_target_and_skips_populated_one() {
        let root = tempdir().unwrap();
        let backups = root.path().join("backups");
        std::fs::create_dir_all(&backups).unwrap();
        fake_backup(&backups, "app_backup_20240101T000000Z");

        let db_path = root.path().join("data");
        let mgr = BackupManager::new(&db_path, &backups, "app_backup_{{timestamp}}");

        assert!(mgr.restore_from_latest().await.unwrap());
        assert!(db_path.join("db").exists());

        // Second call sees the restored data and refuses to overwrite
        assert!(!mgr.restore_from_latest().await.unwrap());
    }
}
