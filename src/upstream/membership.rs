use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use super::{MembershipDirectory, endpoint_for, get_json};
use crate::types::Membership;

const TEAM_MEMBERS: &[&str] = &["api", "v1", "memberships", "course"];

#[derive(Debug, Clone)]
pub struct MembershipClient {
    http: Client,
    base_url: String,
}

impl MembershipClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn members_url(&self, team_id: &str) -> Result<String> {
        endpoint_for(&self.base_url, TEAM_MEMBERS, team_id)
    }
}

#[async_trait]
impl MembershipDirectory for MembershipClient {
    async fn fetch_members(&self, team_id: &str) -> Result<Vec<Membership>> {
        get_json(&self.http, &self.members_url(team_id)?).await
    }
}
