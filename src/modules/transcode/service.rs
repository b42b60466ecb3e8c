use super::dto::TranscodeRequest;
use super::error::TranscodeError;
use super::events::{EventSender, PipelineEvent};
use super::fetcher::{HttpFrameFetcher, resolve_base};
use super::process::TranscodeCommand;
use super::session::{AbortReason, Completion, PipelineSpec, run_pipeline};
use super::sequencer::effective_duration;
use crate::config::settings::TranscodeSettings;
use crate::state::AppState;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;
use validator::Validate;

pub struct TranscodeService;

impl TranscodeService {
    /// Validates the request and turns it into a runnable pipeline.
    pub fn prepare(
        settings: &TranscodeSettings,
        http: &reqwest::Client,
        req: &TranscodeRequest,
    ) -> Result<(PipelineSpec, HttpFrameFetcher), TranscodeError> {
        req.validate()
            .map_err(|e| TranscodeError::InvalidRequest(e.to_string()))?;

        let base = resolve_base(&settings.sources, &req.cloud)?;
        let fetcher = HttpFrameFetcher::new(http.clone(), base, req.title.clone(), req.pad_length);
        // fail on a bad base url before anything is spawned
        fetcher.frame_url(req.cut)?;

        let command = TranscodeCommand::ffmpeg(
            settings.ffmpeg_path.clone(),
            settings.frame_rate,
            req.target(settings),
        );

        Ok((
            PipelineSpec {
                command,
                start: req.cut,
                duration: req.duration,
                max_duration: settings.max_duration,
                policy: settings.fetch_failure_policy,
                timeout: settings.session_timeout,
            },
            fetcher,
        ))
    }

    pub async fn run(
        state: AppState,
        req: TranscodeRequest,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Completion {
        let span = info_span!("session", id = %Uuid::new_v4(), title = %req.title);

        async move {
            info!(
                "📦 Transcode request: {:?} frames {}+{} from `{}`",
                req.format, req.cut, req.duration, req.cloud
            );

            match Self::prepare(&state.transcode, &state.http, &req) {
                Ok((spec, fetcher)) => run_pipeline(spec, Arc::new(fetcher), events, cancel).await,
                Err(e) => {
                    warn!("Rejected transcode request: {}", e);
                    let completion = Completion::aborted_early(
                        AbortReason::Rejected,
                        effective_duration(req.duration, state.transcode.max_duration),
                    );
                    let _ = events.send(PipelineEvent::Error(e.to_string()));
                    let _ = events.send(PipelineEvent::Completed(completion.clone()));
                    completion
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::transcode::dto::OutputFormat;
    use crate::modules::transcode::events;
    use crate::modules::transcode::test_support::app_config;
    use std::collections::HashMap;

    fn request(cloud: &str) -> TranscodeRequest {
        TranscodeRequest {
            cloud: cloud.to_string(),
            title: "clip".to_string(),
            cut: 30,
            duration: 500,
            format: OutputFormat::Gif,
            webp_width: None,
            gif_width: Some(200),
            pad_length: 4,
        }
    }

    #[test]
    fn prepares_spec_from_settings() {
        let settings = TranscodeSettings {
            sources: HashMap::from([("main".to_string(), "https://cdn.example.com".to_string())]),
            ..TranscodeSettings::default()
        };
        let (spec, fetcher) =
            TranscodeService::prepare(&settings, &reqwest::Client::new(), &request("main")).unwrap();

        assert_eq!(spec.start, 30);
        assert_eq!(spec.duration, 500);
        assert_eq!(spec.max_duration, 84);
        assert_eq!(spec.command.program, "ffmpeg");
        assert!(spec.command.args.iter().any(|a| a.contains("scale=200:-1")));
        assert_eq!(
            fetcher.frame_url(31).unwrap().as_str(),
            "https://cdn.example.com/clip/0031.jpg"
        );
    }

    #[test]
    fn rejects_unknown_source_and_invalid_fields() {
        let settings = TranscodeSettings::default();
        let client = reqwest::Client::new();

        assert!(matches!(
            TranscodeService::prepare(&settings, &client, &request("somewhere")),
            Err(TranscodeError::UnknownSource(_))
        ));

        let mut bad = request("https://cdn.example.com");
        bad.pad_length = 99;
        assert!(matches!(
            TranscodeService::prepare(&settings, &client, &bad),
            Err(TranscodeError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn rejected_request_still_completes() {
        let state = AppState::new(app_config("ffmpeg"), reqwest::Client::new());
        let (tx, mut rx) = events::channel();

        let completion =
            TranscodeService::run(state, request("nowhere"), tx, CancellationToken::new()).await;

        assert_eq!(completion.aborted, Some(AbortReason::Rejected));
        assert_eq!(completion.frames_requested, 84);
        assert!(matches!(rx.try_recv(), Ok(PipelineEvent::Error(_))));
        assert!(matches!(rx.try_recv(), Ok(PipelineEvent::Completed(_))));
        assert!(rx.try_recv().is_err());
    }
}
