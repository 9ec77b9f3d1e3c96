pub mod html;
pub mod links;

pub use html::{input_value, meta_content};
pub use links::{first_url, referral_code, ReferralMatcher};
