//! Local Voice Store - 文件系统 + 元数据仓储
//!
//! 实现 VoiceStorePort：
//! - 参考音频保存为 `{voices_dir}/{voice_id}.wav`
//! - 元数据委托给 VoiceRepositoryPort
//! - 解码在 blocking 线程池执行
//! - 保存时先写元数据占位，唯一约束决定同名上传的唯一胜者

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;

use crate::application::ports::{
    NewVoice, RepositoryError, StoreHealth, VoiceReference, VoiceRepositoryPort, VoiceStorePort,
};
use crate::domain::voice::{Voice, VoiceId};
use crate::infrastructure::adapters::audio::{decode_wav, DecodedWav};

/// 本地音色存储
pub struct LocalVoiceStore {
    voices_dir: PathBuf,
    repository: Arc<dyn VoiceRepositoryPort>,
}

impl LocalVoiceStore {
    /// 创建存储并确保目录存在
    pub async fn new(
        voices_dir: impl AsRef<Path>,
        repository: Arc<dyn VoiceRepositoryPort>,
    ) -> Result<Self, RepositoryError> {
        let voices_dir = voices_dir.as_ref().to_path_buf();

        fs::create_dir_all(&voices_dir)
            .await
            .map_err(|e| RepositoryError::IoError(e.to_string()))?;

        Ok(Self {
            voices_dir,
            repository,
        })
    }

    pub fn voices_dir(&self) -> &Path {
        &self.voices_dir
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        self.voices_dir.join(filename)
    }

    async fn decode(data: Vec<u8>) -> Result<DecodedWav, RepositoryError> {
        tokio::task::spawn_blocking(move || decode_wav(&data))
            .await
            .map_err(|e| RepositoryError::IoError(format!("decode task failed: {}", e)))?
    }
}

fn io_error(e: std::io::Error) -> RepositoryError {
    RepositoryError::IoError(e.to_string())
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// 每次写入独占的临时文件名
fn tmp_path_for(path: &Path) -> PathBuf {
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.{}.tmp", std::process::id(), seq));
    path.with_file_name(name)
}

#[async_trait]
impl VoiceStorePort for LocalVoiceStore {
    async fn resolve_voice_reference(
        &self,
        voice_id: &VoiceId,
    ) -> Result<Option<VoiceReference>, RepositoryError> {
        let Some(voice) = self.repository.find_by_id(voice_id).await? else {
            return Ok(None);
        };

        let path = self.path_for(voice.filename());
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    voice_id = %voice_id,
                    path = %path.display(),
                    "Voice record exists but reference file is missing"
                );
                return Ok(None);
            }
            Err(e) => return Err(io_error(e)),
        };

        let decoded = Self::decode(data).await?;

        Ok(Some(VoiceReference {
            voice_id: voice_id.clone(),
            samples: Arc::from(decoded.samples),
            sample_rate: decoded.sample_rate,
            transcript: voice.transcript().as_str().to_string(),
        }))
    }

    async fn voice_exists(&self, voice_id: &VoiceId) -> Result<bool, RepositoryError> {
        let Some(voice) = self.repository.find_by_id(voice_id).await? else {
            return Ok(false);
        };
        fs::try_exists(self.path_for(voice.filename()))
            .await
            .map_err(io_error)
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, RepositoryError> {
        self.repository.find_all().await
    }

    async fn save_voice(&self, new_voice: NewVoice) -> Result<Voice, RepositoryError> {
        if self.repository.find_by_id(&new_voice.voice_id).await?.is_some() {
            return Err(RepositoryError::Duplicate(new_voice.voice_id.to_string()));
        }

        let NewVoice {
            voice_id,
            sample_rate,
            transcript,
            wav_data,
        } = new_voice;

        // 先解码校验，非法 WAV 不落盘
        let decoded = Self::decode(wav_data.clone()).await?;
        if decoded.sample_rate != sample_rate {
            tracing::warn!(
                voice_id = %voice_id,
                declared = sample_rate,
                actual = decoded.sample_rate,
                "Declared sample rate differs from WAV header"
            );
        }

        let voice = Voice::new(voice_id, sample_rate, transcript, decoded.duration_seconds());
        let path = self.path_for(voice.filename());

        // 元数据先行：唯一约束失败的一方不会触碰文件
        self.repository.save(&voice).await?;

        let tmp_path = tmp_path_for(&path);
        let written = match fs::write(&tmp_path, &wav_data).await {
            Ok(()) => fs::rename(&tmp_path, &path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path).await;
            if let Err(rollback) = self.repository.delete(voice.voice_id()).await {
                tracing::error!(
                    voice_id = %voice.voice_id(),
                    error = %rollback,
                    "Failed to roll back voice record"
                );
            }
            return Err(io_error(e));
        }

        tracing::info!(
            voice_id = %voice.voice_id(),
            duration_seconds = voice.duration_seconds(),
            bytes = wav_data.len(),
            "Voice saved"
        );

        Ok(voice)
    }

    async fn delete_voice(&self, voice_id: &VoiceId) -> Result<bool, RepositoryError> {
        let Some(voice) = self.repository.find_by_id(voice_id).await? else {
            return Ok(false);
        };

        if !self.repository.delete(voice_id).await? {
            return Ok(false);
        }

        match fs::remove_file(self.path_for(voice.filename())).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(voice_id = %voice_id, error = %e, "Failed to remove reference file");
            }
        }

        tracing::info!(voice_id = %voice_id, "Voice deleted");
        Ok(true)
    }

    async fn rename_voice(
        &self,
        old_id: &VoiceId,
        new_id: &VoiceId,
    ) -> Result<(), RepositoryError> {
        let voice = self
            .repository
            .find_by_id(old_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(old_id.to_string()))?;

        self.repository.rename(old_id, new_id).await?;

        let from = self.path_for(voice.filename());
        let to = self.path_for(&new_id.filename());
        if let Err(e) = fs::rename(&from, &to).await {
            // 回滚元数据
            if let Err(rollback) = self.repository.rename(new_id, old_id).await {
                tracing::error!(
                    old_voice_id = %old_id,
                    new_voice_id = %new_id,
                    error = %rollback,
                    "Failed to roll back voice rename"
                );
            }
            return Err(io_error(e));
        }

        tracing::info!(old_voice_id = %old_id, new_voice_id = %new_id, "Voice renamed");
        Ok(())
    }

    async fn health(&self) -> StoreHealth {
        let voice_dir_accessible = fs::metadata(&self.voices_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);

        StoreHealth {
            voice_dir_accessible,
            database_accessible: self.repository.ping().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audio::encode_wav_complete;
    use crate::domain::voice::VoiceTranscript;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteVoiceRepository,
    };
    use tempfile::TempDir;

    async fn store() -> (TempDir, LocalVoiceStore) {
        let dir = TempDir::new().unwrap();
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo: Arc<dyn VoiceRepositoryPort> = Arc::new(SqliteVoiceRepository::new(pool));
        let store = LocalVoiceStore::new(dir.path().join("voices"), repo)
            .await
            .unwrap();
        (dir, store)
    }

    fn new_voice(id: &str) -> NewVoice {
        NewVoice {
            voice_id: VoiceId::parse(id).unwrap(),
            sample_rate: 16000,
            transcript: VoiceTranscript::new("hello world").unwrap(),
            wav_data: encode_wav_complete(&vec![0.1f32; 8000], 16000),
        }
    }

    #[tokio::test]
    async fn test_save_and_resolve() {
        let (_dir, store) = store().await;
        let voice = store.save_voice(new_voice("narrator")).await.unwrap();
        assert!((voice.duration_seconds() - 0.5).abs() < 1e-9);
        assert!(store.voices_dir().join("narrator.wav").exists());

        let id = VoiceId::parse("narrator").unwrap();
        assert!(store.voice_exists(&id).await.unwrap());

        let reference = store.resolve_voice_reference(&id).await.unwrap().unwrap();
        assert_eq!(reference.sample_rate, 16000);
        assert_eq!(reference.samples.len(), 8000);
        assert_eq!(reference.transcript, "hello world");
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_uploads() {
        let (_dir, store) = store().await;
        store.save_voice(new_voice("narrator")).await.unwrap();

        assert!(matches!(
            store.save_voice(new_voice("narrator")).await,
            Err(RepositoryError::Duplicate(_))
        ));

        let mut bad = new_voice("broken");
        bad.wav_data = b"not a wav file".to_vec();
        assert!(matches!(
            store.save_voice(bad).await,
            Err(RepositoryError::InvalidAudio(_))
        ));
        assert!(!store.voices_dir().join("broken.wav").exists());
    }

    #[tokio::test]
    async fn test_concurrent_uploads_have_one_winner() {
        let (_dir, store) = store().await;

        let mut first = new_voice("narrator");
        first.wav_data = encode_wav_complete(&vec![0.1f32; 8000], 16000);
        let mut second = new_voice("narrator");
        second.wav_data = encode_wav_complete(&vec![0.2f32; 16000], 16000);

        let (a, b) = tokio::join!(store.save_voice(first), store.save_voice(second));
        let winner = match (a, b) {
            (Ok(voice), Err(RepositoryError::Duplicate(_)))
            | (Err(RepositoryError::Duplicate(_)), Ok(voice)) => voice,
            other => panic!("expected exactly one winner, got {:?}", other),
        };

        let id = VoiceId::parse("narrator").unwrap();
        assert!(store.voice_exists(&id).await.unwrap());
        assert_eq!(store.list_voices().await.unwrap().len(), 1);

        // 文件内容与胜者的元数据一致
        let reference = store.resolve_voice_reference(&id).await.unwrap().unwrap();
        let expected = (winner.duration_seconds() * 16000.0).round() as usize;
        assert_eq!(reference.samples.len(), expected);

        let leftovers: Vec<_> = std::fs::read_dir(store.voices_dir())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let (_dir, store) = store().await;
        store.save_voice(new_voice("narrator")).await.unwrap();
        std::fs::remove_file(store.voices_dir().join("narrator.wav")).unwrap();

        let id = VoiceId::parse("narrator").unwrap();
        assert!(!store.voice_exists(&id).await.unwrap());
        assert!(store.resolve_voice_reference(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let (_dir, store) = store().await;
        store.save_voice(new_voice("narrator")).await.unwrap();
        let id = VoiceId::parse("narrator").unwrap();

        assert!(store.delete_voice(&id).await.unwrap());
        assert!(!store.voices_dir().join("narrator.wav").exists());
        assert!(!store.delete_voice(&id).await.unwrap());
        assert!(store.list_voices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rename_moves_file() {
        let (_dir, store) = store().await;
        store.save_voice(new_voice("old")).await.unwrap();
        let old = VoiceId::parse("old").unwrap();
        let new = VoiceId::parse("new").unwrap();

        store.rename_voice(&old, &new).await.unwrap();
        assert!(!store.voices_dir().join("old.wav").exists());
        assert!(store.voices_dir().join("new.wav").exists());
        assert!(store.voice_exists(&new).await.unwrap());
        assert!(!store.voice_exists(&old).await.unwrap());

        assert!(matches!(
            store.rename_voice(&old, &new).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, store) = store().await;
        let health = store.health().await;
        assert!(health.voice_dir_accessible);
        assert!(health.database_accessible);
    }
}
