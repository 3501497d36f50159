use serde_json::json;

use crate::api::models::DevicesResponse;
use crate::api::{ApiClient, ApiRequest, Device};
use crate::error::Result;

impl ApiClient {
    pub async fn devices(&self) -> Result<Vec<Device>> {
        let resp = self.call(&ApiRequest::get("me/player/devices")).await?;
        let parsed: DevicesResponse = resp.json()?;
        Ok(parsed.devices)
    }

    pub async fn transfer_playback(&self, device_id: &str) -> Result<()> {
        let request = ApiRequest::put("me/player").json(json!({
            "device_ids": [device_id],
        }));
        self.call(&request).await?;
        Ok(())
    }
}
