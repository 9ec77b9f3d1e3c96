//! Helper functions for the verification step
use tracing::{info, warn};

use enroller_core::Result;
use enroller_parser::ReferralMatcher;

use crate::http::WaitlistApi;

/// Open the verification link and look for the account's own referral link on the
/// page it lands on. A page without one is not an error.
pub async fn follow_verification_link(
    api: &dyn WaitlistApi,
    verification_link: &str,
    referral: &ReferralMatcher,
) -> Result<Option<String>> {
    info!("Following verification link: {}", verification_link);

    let page = api.fetch_page(verification_link).await?;

    match referral.find(&page) {
        Some(url) => {
            info!("✓ Found referral link: {}", url);
            Ok(Some(url))
        }
        None => {
            warn!("⚠️  Verified, but no referral link on the landing page");
            Ok(None)
        }
    }
}
