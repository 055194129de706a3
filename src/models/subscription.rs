use crate::entities::subscription_entity as subs;
use crate::error::{AppError, AppResult};
use crate::utils::{ActivePeriod, Month, MonthParseError, parse_month_year};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub const SERVICE_NAME_MAX_LEN: usize = 100;

/// A stored subscription as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    pub user_id: Uuid,
    #[schema(example = "Netflix")]
    pub service_name: String,
    #[schema(example = 300)]
    pub price: i32,
    #[schema(value_type = String, example = "07-2025")]
    pub start_date: Month,
    #[schema(value_type = Option<String>, example = "08-2025")]
    pub end_date: Option<Month>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn period(&self) -> ActivePeriod {
        ActivePeriod::new(self.start_date, self.end_date)
    }
}

impl TryFrom<subs::Model> for Subscription {
    type Error = AppError;

    fn try_from(m: subs::Model) -> AppResult<Self> {
        let corrupt = |e: MonthParseError| {
            AppError::InternalError(format!("stored subscription {}: {e}", m.id))
        };
        let start_date = Month::from_date(m.start_date).map_err(corrupt)?;
        let end_date = m
            .end_date
            .map(Month::from_date)
            .transpose()
            .map_err(corrupt)?;
        let now = Utc::now();
        Ok(Self {
            user_id: m.user_id,
            service_name: m.service_name,
            price: m.price,
            start_date,
            end_date,
            created_at: m.created_at.unwrap_or(now),
            updated_at: m.updated_at.unwrap_or(now),
        })
    }
}

/// Validated write input for a single (user, service) record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub service_name: String,
    pub price: i32,
    pub period: ActivePeriod,
}

/// Body of `POST /subscriptions` and `PUT /subscriptions`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionRequest {
    #[schema(example = "Netflix")]
    pub service_name: String,
    #[schema(example = 300)]
    pub price: i32,
    pub user_id: Uuid,
    #[schema(example = "07-2025")]
    pub start_date: String,
    #[serde(default)]
    #[schema(example = "08-2025")]
    pub end_date: Option<String>,
}

impl SubscriptionRequest {
    pub fn validate(self) -> AppResult<NewSubscription> {
        let service_name = self.service_name.trim().to_string();
        if service_name.is_empty() {
            return Err(AppError::ValidationError(
                "service_name is required".to_string(),
            ));
        }
        if service_name.chars().count() > SERVICE_NAME_MAX_LEN {
            return Err(AppError::ValidationError(format!(
                "service_name must be at most {SERVICE_NAME_MAX_LEN} characters"
            )));
        }
        if self.price <= 0 {
            return Err(AppError::ValidationError(
                "price must be positive".to_string(),
            ));
        }
        if self.start_date.trim().is_empty() {
            return Err(AppError::ValidationError(
                "start_date is required".to_string(),
            ));
        }
        let start = parse_month_year(&self.start_date)
            .map_err(|e| AppError::ValidationError(format!("start_date: {e}")))?;

        // empty end_date means open-ended
        let end = match self.end_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                parse_month_year(raw)
                    .map_err(|e| AppError::ValidationError(format!("end_date: {e}")))?,
            ),
        };
        if let Some(end) = end
            && end < start
        {
            return Err(AppError::ValidationError(
                "end_date must not be before start_date".to_string(),
            ));
        }

        Ok(NewSubscription {
            user_id: self.user_id,
            service_name,
            price: self.price,
            period: ActivePeriod::new(start, end),
        })
    }
}

/// Body of `DELETE /subscriptions`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteSubscriptionRequest {
    pub user_id: Uuid,
    #[schema(example = "Netflix")]
    pub service_name: String,
}

/// Query of `GET /subscriptions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubscriptionKeyQuery {
    /// User ID (UUID)
    pub user_id: Option<String>,
    /// Service name
    pub service_name: Option<String>,
}

impl SubscriptionKeyQuery {
    pub fn into_key(self) -> AppResult<(Uuid, String)> {
        let user_id = non_empty(self.user_id);
        let service_name = non_empty(self.service_name);
        let (Some(user_id), Some(service_name)) = (user_id, service_name) else {
            return Err(AppError::ValidationError(
                "user_id and service_name parameters are required".to_string(),
            ));
        };
        Ok((parse_user_id(&user_id)?, service_name))
    }
}

/// Query of `PUT /subscriptions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UpsertQuery {
    /// Insert the record when it does not exist yet
    #[serde(default)]
    pub upsert: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionListResponse {
    pub user_id: Uuid,
    pub subscriptions: Vec<Subscription>,
    #[schema(example = "RUB")]
    pub currency: String,
}

/// Query of `GET /subscriptions/total`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TotalQuery {
    /// Start month (MM-YYYY or YYYY-MM)
    pub start_month: Option<String>,
    /// End month (MM-YYYY or YYYY-MM)
    pub end_month: Option<String>,
    /// Optional user filter (UUID)
    pub user_id: Option<String>,
    /// Optional service filter
    pub service_name: Option<String>,
}

/// Parsed filters for the period cost aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct TotalFilter {
    pub start_month: Month,
    pub end_month: Month,
    pub user_id: Option<Uuid>,
    pub service_name: Option<String>,
}

impl TotalFilter {
    pub fn matches(&self, sub: &Subscription) -> bool {
        self.user_id.is_none_or(|id| id == sub.user_id)
            && self
                .service_name
                .as_deref()
                .is_none_or(|name| name == sub.service_name)
            && sub.period().overlaps(self.start_month, self.end_month)
    }
}

impl TryFrom<TotalQuery> for TotalFilter {
    type Error = AppError;

    fn try_from(q: TotalQuery) -> AppResult<Self> {
        let start_month = non_empty(q.start_month)
            .ok_or_else(|| AppError::ValidationError("start_month is required".to_string()))?;
        let end_month = non_empty(q.end_month)
            .ok_or_else(|| AppError::ValidationError("end_month is required".to_string()))?;
        let start_month = parse_month_year(&start_month)
            .map_err(|e| AppError::ValidationError(format!("start_month: {e}")))?;
        let end_month = parse_month_year(&end_month)
            .map_err(|e| AppError::ValidationError(format!("end_month: {e}")))?;
        let user_id = non_empty(q.user_id)
            .map(|raw| parse_user_id(&raw))
            .transpose()?;

        Ok(Self {
            start_month,
            end_month,
            user_id,
            service_name: non_empty(q.service_name),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PeriodInfo {
    #[schema(value_type = String, example = "01-2025")]
    pub start_month: Month,
    #[schema(value_type = String, example = "12-2025")]
    pub end_month: Month,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct TotalFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TotalResponse {
    pub success: bool,
    #[schema(example = 1200)]
    pub total: i64,
    #[schema(example = "RUB")]
    pub currency: String,
    pub period: PeriodInfo,
    pub filters: TotalFilters,
}

impl TotalResponse {
    pub fn new(filter: TotalFilter, total: i64, currency: &str) -> Self {
        Self {
            success: true,
            total,
            currency: currency.to_string(),
            period: PeriodInfo {
                start_month: filter.start_month,
                end_month: filter.end_month,
            },
            filters: TotalFilters {
                user_id: filter.user_id,
                service_name: filter.service_name,
            },
        }
    }
}

pub fn parse_user_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::ValidationError("Invalid user ID".to_string()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
