use common::utils::config::AppConfig;

use crate::adapters::clip_stitching::{Branding, Captions, StitchOptions};

#[derive(Debug, Clone)]
pub struct RenderTuning {
    /// Scenes rendered at the same time.
    pub render_concurrency: usize,
    /// Retries after the first attempt of an adapter call.
    pub retry_attempts: usize,
    pub retry_base_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for RenderTuning {
    fn default() -> Self {
        Self {
            render_concurrency: 3,
            retry_attempts: 3,
            retry_base_ms: 250,
            retry_max_delay_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderConfig {
    pub tuning: RenderTuning,
    pub branding: Branding,
    pub burn_in_captions: bool,
}

impl RenderConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: RenderTuning {
                render_concurrency: config.render_concurrency.max(1),
                retry_attempts: config.adapter_retry_attempts,
                retry_base_ms: config.adapter_retry_base_ms,
                ..RenderTuning::default()
            },
            branding: Branding {
                name: config.brand_name.clone(),
                logo_path: config.brand_logo_path.clone(),
            },
            burn_in_captions: config.burn_in_captions,
        }
    }

    /// Stitch options for a plan whose voiceovers are `captions`, in scene order.
    pub fn stitch_options(&self, captions: Vec<String>) -> StitchOptions {
        StitchOptions {
            branding: self.branding.clone(),
            captions: self.burn_in_captions.then(|| Captions {
                burn_in: true,
                lines: captions,
            }),
        }
    }
}
