//! Experience state repository port (read side).
//!
//! Writes go through the draw unit of work only; reading outside the
//! transaction is safe because draws of one (user, campaign) pair are
//! serialized by the executor's lock.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DrawResult;
use crate::domain::models::{UserExperienceState, UserGlobalState};

#[async_trait]
pub trait ExperienceRepository: Send + Sync {
    async fn get_experience(
        &self,
        user_id: &str,
        campaign_id: Uuid,
    ) -> DrawResult<Option<UserExperienceState>>;

    async fn get_global(&self, user_id: &str) -> DrawResult<Option<UserGlobalState>>;
}
