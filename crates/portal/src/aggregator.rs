//! SIM data aggregation
//!
//! A lookup is two portal calls: the basic lookup by ICCID or VIN, then the
//! change history of the single SIM it found.

use jasper_common::time::portal_timestamp_display;
use jasper_common::{
    ChangeHistory, ChangeHistoryEntry, ErrorMessage, Result, ResultEnvelope, SessionCookieSet,
    SimRecord,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::client::{is_auth_required, ApiClient, PortalResponse};

/// Request template used for the basic lookup.
pub const BASIC_LOOKUP_REQUEST: &str = "sim_basic_data";

/// Request template used for the change history of one SIM.
pub const CHANGE_HISTORY_REQUEST: &str = "sim_change_history";

/// Outcome of the basic lookup step.
#[derive(Debug, Clone, PartialEq)]
pub enum BasicLookup {
    Found(SimRecord),
    Failed(ErrorMessage),
}

/// Runs the two-step lookup for one search value.
pub struct SimDataAggregator<'a> {
    client: &'a ApiClient,
    search_value: &'a str,
}

impl<'a> SimDataAggregator<'a> {
    pub fn new(client: &'a ApiClient, search_value: &'a str) -> Self {
        Self {
            client,
            search_value,
        }
    }

    #[instrument(skip(self, cookies), fields(search_value = %self.search_value))]
    pub async fn get_sim_data(&self, cookies: &SessionCookieSet) -> Result<ResultEnvelope> {
        let response = self
            .client
            .invoke(BASIC_LOOKUP_REQUEST, self.search_value, cookies)
            .await?;

        let record = match interpret_basic_lookup(response) {
            BasicLookup::Found(record) => record,
            BasicLookup::Failed(reason) => {
                info!("Lookup for {} ended with {}", self.search_value, reason);
                return Ok(ResultEnvelope::failure(reason));
            }
        };
        debug!("Found SIM {}", record.sim_id);

        let response = self
            .client
            .invoke(CHANGE_HISTORY_REQUEST, &record.sim_id, cookies)
            .await?;

        let (success, history) = match interpret_change_history(response) {
            Some(history) => (true, history),
            None => {
                warn!("Change history for SIM {} unavailable", record.sim_id);
                (false, ChangeHistory::new())
            }
        };

        Ok(ResultEnvelope {
            success,
            error_message: None,
            sim_basic_data: Some(record),
            sim_change_history: Some(history),
        })
    }
}

/// Map a basic-lookup response onto a SIM record or a caller-facing failure.
pub fn interpret_basic_lookup(response: PortalResponse) -> BasicLookup {
    let body = match response {
        PortalResponse::AuthRequired => {
            return BasicLookup::Failed(ErrorMessage::CookiesNeedUpdate)
        }
        PortalResponse::Unknown(raw) => {
            warn!("Unrecognized lookup response: {}", raw);
            return BasicLookup::Failed(ErrorMessage::UnknownError);
        }
        PortalResponse::Data(body) => body,
    };

    let Some(total) = body.get("totalCount") else {
        if is_auth_required(&body) {
            return BasicLookup::Failed(ErrorMessage::CookiesNeedUpdate);
        }
        warn!("Lookup response without totalCount: {}", body);
        return BasicLookup::Failed(ErrorMessage::UnknownError);
    };

    match whole_count(total) {
        Some(0) => BasicLookup::Failed(ErrorMessage::CanNotFindSim),
        Some(1) => match body.get("data").and_then(|d| d.get(0)).and_then(sim_record) {
            Some(record) => BasicLookup::Found(record),
            None => {
                warn!("Lookup reported one SIM but carried no usable record: {}", body);
                BasicLookup::Failed(ErrorMessage::UnknownError)
            }
        },
        Some(_) => BasicLookup::Failed(ErrorMessage::MoreThanOneSim),
        None => {
            warn!("Unusable totalCount in lookup response: {}", body);
            BasicLookup::Failed(ErrorMessage::UnknownError)
        }
    }
}

/// Build the history mapping, or `None` when the portal did not report success.
///
/// Change types keep the order the portal listed them in; a later entry of
/// the same change type replaces the earlier one in place.
pub fn interpret_change_history(response: PortalResponse) -> Option<ChangeHistory> {
    let body = match response {
        PortalResponse::Data(body) => body,
        PortalResponse::AuthRequired => return None,
        PortalResponse::Unknown(raw) => {
            warn!("Unrecognized history response: {}", raw);
            return None;
        }
    };

    if body.get("success").and_then(Value::as_bool) != Some(true) {
        return None;
    }

    let mut history = ChangeHistory::new();
    let records = body.get("data").and_then(Value::as_array);
    for record in records.into_iter().flatten() {
        let Some(change_type) = text(record.get("changeTypeDisplay")) else {
            debug!("Skipping history record without a change type");
            continue;
        };
        history.insert(
            change_type,
            ChangeHistoryEntry {
                target_value: record.get("targetValue").cloned().unwrap_or(Value::Null),
                source_value: record.get("sourceValue").cloned().unwrap_or(Value::Null),
                start_time: portal_timestamp_display(record.get("startTime")),
                end_time: portal_timestamp_display(record.get("endTime")),
                change_by: text(record.get("userName")),
            },
        );
    }
    Some(history)
}

/// A non-negative whole number, whether sent as `1` or `1.0`.
fn whole_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    })
}

fn sim_record(data: &Value) -> Option<SimRecord> {
    let aux = data.get("simAuxFieldsDTO");
    Some(SimRecord {
        sim_id: text(data.get("simId"))?,
        iccid: text(data.get("iccid")),
        imei: text(aux.and_then(|a| a.get("imei"))),
        bound_vin: text(data.get("custom1")),
        brand: text(data.get("custom2")),
        lifecycle: text(data.get("custom3")),
        session_type_now: text(data.get("sessionType")),
        device_type: text(aux.and_then(|a| a.get("custom9"))),
        activation_datetime: portal_timestamp_display(data.get("activationDate")),
    })
}

/// Scalar field as text; null, missing and structured values are absent.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
