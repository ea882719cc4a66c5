mod bitrate;
mod error;
mod ffmpeg_cmd;
mod ffmpeg_info;
mod filters;
mod log;
mod progress;
mod types;

pub use bitrate::{AUDIO_ALLOWANCE_BPS, MIN_VIDEO_KBPS, compute_target_bitrate, target_video_kbps};
pub use error::{EngineError, EngineResult};
pub use ffmpeg_cmd::{
    BuildSettings, Invocation, build_invocations, format_invocation, generated_output_path,
    output_container, resolve_output_paths, split_part_path,
};
pub use ffmpeg_info::{resolve_transcoder, transcoder_version};
pub use filters::{
    ATEMPO_MAX, ATEMPO_MIN, EffectChain, TrimPlan, atempo_stages, build_concat_graph,
    build_effect_chain, format_seconds, plan_trim,
};
pub use log::{DEBUG_LOG_FILE, init_logging};
pub use progress::{ProgressParser, ProgressSample, parse_chunk, parse_segment};
pub use types::{
    CompressOptions, EffectsOptions, EncodeOptions, EventState, Job, JobId, JobKind, JobOptions,
    JobState, ProgressEvent, Range, TrimMode, TrimOptions, VideoCodec,
};
