use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use songbird::input::{HttpRequest, Input};
use std::fmt;
use tracing::debug;

use super::error::StreamError;

/// Container/codec reported by the extractor for the chosen format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodingHint {
    pub container: Option<String>,
    pub codec: Option<String>,
}

impl fmt::Display for EncodingHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.container.as_deref().unwrap_or("?"),
            self.codec.as_deref().unwrap_or("?")
        )
    }
}

/// Stream de audio listo para entregar al reproductor
pub struct AudioStream {
    pub input: Input,
    pub hint: EncodingHint,
}

impl fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioStream")
            .field("hint", &self.hint)
            .finish_non_exhaustive()
    }
}

/// Obtains a live audio stream for a resolved song's source URL.
///
/// Opens may be slow or fail; the engine bounds them with a timeout and a
/// cancellation token, so implementations need neither.
#[async_trait]
pub trait StreamProvider: Send + Sync {
    async fn open(&self, source_url: &str) -> Result<AudioStream, StreamError>;
}

#[derive(Debug, Deserialize)]
struct SelectedFormat {
    url: Option<String>,
    ext: Option<String>,
    acodec: Option<String>,
}

/// Extrae el mejor formato de audio con yt-dlp y lo sirve por HTTP
pub struct YtDlpStreamProvider {
    binary: String,
    http: reqwest::Client,
}

impl YtDlpStreamProvider {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl StreamProvider for YtDlpStreamProvider {
    async fn open(&self, source_url: &str) -> Result<AudioStream, StreamError> {
        debug!("🎵 Obteniendo stream para: {}", source_url);

        let output = Command::new(&self.binary)
            .args([
                "--no-playlist",
                "-f",
                "bestaudio/best",
                "--dump-json",
                "--no-warnings",
                source_url,
            ])
            .output()
            .await
            .map_err(|e| StreamError::Extraction(format!("no se pudo ejecutar yt-dlp: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(StreamError::Extraction(error.trim().to_string()));
        }

        let format: SelectedFormat = serde_json::from_slice(&output.stdout)
            .map_err(|e| StreamError::Extraction(format!("respuesta inválida: {}", e)))?;

        let url = format
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| StreamError::NoAudioFormat(source_url.to_string()))?;

        let hint = EncodingHint {
            container: format.ext,
            codec: format.acodec.filter(|c| c != "none"),
        };
        debug!("✅ Formato seleccionado: {}", hint);

        Ok(AudioStream {
            input: Input::from(HttpRequest::new(self.http.clone(), url)),
            hint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_display() {
        let hint = EncodingHint {
            container: Some("webm".into()),
            codec: Some("opus".into()),
        };
        assert_eq!(hint.to_string(), "webm/opus");
        assert_eq!(EncodingHint::default().to_string(), "?/?");
    }

    #[test]
    fn test_selected_format_parsing() {
        let format: SelectedFormat = serde_json::from_str(
            r#"{"url":"https://rr3.googlevideo.com/videoplayback?x=1","ext":"webm","acodec":"opus","title":"ignored"}"#,
        )
        .unwrap();
        assert_eq!(format.ext.as_deref(), Some("webm"));
        assert_eq!(format.acodec.as_deref(), Some("opus"));
        assert!(format.url.is_some());
    }

    #[tokio::test]
    async fn test_missing_binary_is_extraction_error() {
        let provider = YtDlpStreamProvider::new("definitely-not-a-real-yt-dlp-binary");
        let result = provider.open("https://youtu.be/abc").await;
        assert!(matches!(result, Err(StreamError::Extraction(_))));
    }
}
