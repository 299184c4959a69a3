//! Wire shapes for the auth and REST endpoints.
//!
//! Responses decode into these DTOs first and map into domain records in one
//! pass; unreadable rows surface as `String` reasons for the adapter to wrap.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AdminLoanView, Email, IdentityId, LoanApplication, LoanCategory, LoanId, LoanPeriod,
    LoanStatus, NewLoanApplication, Profile, ProfileDetails, ProviderSession, Username,
};

#[derive(Debug, Deserialize)]
pub(super) struct UserDto {
    pub(super) id: String,
    pub(super) email: Option<String>,
}

impl UserDto {
    pub(super) fn into_provider_session(self) -> Result<ProviderSession, String> {
        let identity_id = IdentityId::new(&self.id)
            .map_err(|err| format!("user id {:?} is not usable: {err}", self.id))?;
        Ok(ProviderSession {
            identity_id,
            email: self.email.and_then(|raw| Email::new(raw).ok()),
        })
    }
}

/// Token, sign-up and verify responses.
///
/// Sign-up with email confirmation enabled returns the bare user object, so
/// `id`/`email` may sit at the top level instead of under `user`.
#[derive(Debug, Deserialize)]
pub(super) struct AuthResponseDto {
    pub(super) access_token: Option<String>,
    pub(super) user: Option<UserDto>,
    pub(super) id: Option<String>,
    pub(super) email: Option<String>,
}

impl AuthResponseDto {
    pub(super) fn into_parts(self) -> Result<(ProviderSession, Option<String>), String> {
        let user = match (self.user, self.id) {
            (Some(user), _) => user,
            (None, Some(id)) => UserDto {
                id,
                email: self.email,
            },
            (None, None) => return Err("response carried no user".to_owned()),
        };
        Ok((user.into_provider_session()?, self.access_token))
    }
}

/// Error payloads vary by endpoint and server version.
#[derive(Debug, Default, Deserialize)]
pub(super) struct AuthErrorDto {
    error_code: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

impl AuthErrorDto {
    pub(super) fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// Whether the refusal says the email already has an account.
    ///
    /// Newer servers tag this with `error_code`; older ones only say so in
    /// the message.
    pub(super) fn reports_existing_account(&self) -> bool {
        if matches!(
            self.error_code.as_deref(),
            Some("user_already_exists" | "email_exists")
        ) {
            return true;
        }
        self.error_description
            .as_deref()
            .or(self.msg.as_deref())
            .or(self.message.as_deref())
            .is_some_and(|text| text.to_ascii_lowercase().contains("already registered"))
    }

    pub(super) fn into_message(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.message)
    }
}

/// Projection returned by `select=id` queries.
#[derive(Debug, Deserialize)]
pub(super) struct IdRowDto {
    #[expect(dead_code, reason = "rows are only counted")]
    pub(super) id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ProfileRowDto {
    pub(super) id: String,
    pub(super) username: String,
    pub(super) email: String,
    #[serde(default)]
    pub(super) full_name: Option<String>,
    #[serde(default)]
    pub(super) date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub(super) gender: Option<String>,
    #[serde(default)]
    pub(super) occupation: Option<String>,
    #[serde(default)]
    pub(super) monthly_income: Option<u64>,
}

impl ProfileRowDto {
    pub(super) fn from_profile(profile: &Profile) -> Self {
        let details = ProfileDetailsDto::from_details(&profile.details);
        Self {
            id: profile.id.to_string(),
            username: profile.username.to_string(),
            email: profile.email.to_string(),
            full_name: details.full_name,
            date_of_birth: details.date_of_birth,
            gender: details.gender,
            occupation: details.occupation,
            monthly_income: details.monthly_income,
        }
    }

    pub(super) fn into_profile(self) -> Result<Profile, String> {
        let id = IdentityId::new(&self.id).map_err(|err| format!("profile id: {err}"))?;
        let username =
            Username::new(self.username).map_err(|err| format!("profile {id} username: {err}"))?;
        let email = Email::new(self.email).map_err(|err| format!("profile {id} email: {err}"))?;
        Ok(Profile {
            id,
            username,
            email,
            details: ProfileDetails {
                full_name: self.full_name,
                date_of_birth: self.date_of_birth,
                gender: self.gender,
                occupation: self.occupation,
                monthly_income: self.monthly_income,
            },
        })
    }
}

/// PATCH body for profile completion.
#[derive(Debug, Serialize)]
pub(super) struct ProfileDetailsDto {
    full_name: Option<String>,
    date_of_birth: Option<NaiveDate>,
    gender: Option<String>,
    occupation: Option<String>,
    monthly_income: Option<u64>,
}

impl ProfileDetailsDto {
    pub(super) fn from_details(details: &ProfileDetails) -> Self {
        Self {
            full_name: details.full_name.clone(),
            date_of_birth: details.date_of_birth,
            gender: details.gender.clone(),
            occupation: details.occupation.clone(),
            monthly_income: details.monthly_income,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct NewLoanRowDto {
    user_id: String,
    purpose: &'static str,
    amount: u64,
    period: String,
    status: &'static str,
    created_at: DateTime<Utc>,
}

impl NewLoanRowDto {
    pub(super) fn from_new(row: &NewLoanApplication) -> Self {
        Self {
            user_id: row.owner_id.to_string(),
            purpose: row.category.name(),
            amount: row.amount,
            period: row.period.to_string(),
            status: row.status.label(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct LoanStatusPatchDto {
    pub(super) status: &'static str,
}

#[derive(Debug, Deserialize)]
pub(super) struct OwnerDto {
    pub(super) username: Option<String>,
}

/// Loan row, optionally embedding the owner's profile.
#[derive(Debug, Deserialize)]
pub(super) struct LoanRowDto {
    pub(super) id: i64,
    pub(super) user_id: String,
    pub(super) purpose: String,
    pub(super) amount: u64,
    pub(super) period: String,
    pub(super) status: String,
    pub(super) created_at: DateTime<Utc>,
    #[serde(default)]
    pub(super) profiles: Option<OwnerDto>,
}

impl LoanRowDto {
    pub(super) fn into_application(self) -> Result<LoanApplication, String> {
        self.into_parts().map(|(application, _)| application)
    }

    pub(super) fn into_admin_view(self) -> Result<AdminLoanView, String> {
        let (application, owner) = self.into_parts()?;
        Ok(AdminLoanView::new(application, owner))
    }

    fn into_parts(self) -> Result<(LoanApplication, Option<String>), String> {
        let id = self.id;
        let context = |err: &dyn std::fmt::Display| format!("loan {id}: {err}");
        let application = LoanApplication {
            id: LoanId::new(id),
            owner_id: IdentityId::new(&self.user_id).map_err(|err| context(&err))?,
            category: LoanCategory::parse(&self.purpose).map_err(|err| context(&err))?,
            amount: self.amount,
            period: LoanPeriod::parse(&self.period).map_err(|err| context(&err))?,
            status: LoanStatus::normalize(&self.status).map_err(|err| context(&err))?,
            created_at: self.created_at,
        };
        let owner = self.profiles.and_then(|profile| profile.username);
        Ok((application, owner))
    }
}
