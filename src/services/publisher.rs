// src/services/publisher.rs
use crate::errors::AdlensError;
use crate::models::{Asset, Platform, PublishReceipt};
use crate::services::busy::BusyFlag;
use std::time::Duration;

/// Simulated hand-off to an ad platform: waits, then confirms.
pub struct Publisher {
    delay: Duration,
    busy: BusyFlag,
}

impl Publisher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            busy: BusyFlag::new(),
        }
    }

    pub async fn publish(
        &self,
        asset: &Asset,
        platform: Platform,
    ) -> Result<PublishReceipt, AdlensError> {
        let _guard = self
            .busy
            .try_acquire()
            .ok_or(AdlensError::PublishInProgress)?;

        log::info!("Sending '{}' to {}", asset.name, platform);
        tokio::time::sleep(self.delay).await;

        Ok(PublishReceipt {
            content_sn_id: asset.content_sn_id.clone(),
            asset_name: asset.name.clone(),
            platform,
            published_at: chrono::Utc::now(),
            message: format!("'{}' has been sent to the {} ads manager.", asset.name, platform),
        })
    }
}
