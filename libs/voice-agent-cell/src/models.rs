use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use medical_ticket_cell::TicketPriority;
use patient_cell::PatientLookup;

/// Body of every server message the voice platform posts.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceWebhookRequest {
    pub message: ServerMessage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "tool-calls")]
    ToolCalls {
        #[serde(rename = "toolCallList", default)]
        tool_call_list: Vec<ToolCall>,
        #[serde(default)]
        call: Option<CallInfo>,
    },

    #[serde(rename = "function-call")]
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCall,
        #[serde(default)]
        call: Option<CallInfo>,
    },

    /// Status updates, transcripts and end-of-call reports.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default, alias = "parameters")]
    pub arguments: Value,
}

impl FunctionCall {
    /// Arguments arrive either as an object or as JSON-encoded text.
    pub fn arguments(&self) -> Result<Value, VoiceError> {
        match &self.arguments {
            Value::Null => Ok(Value::Object(Default::default())),
            Value::String(text) if text.trim().is_empty() => Ok(Value::Object(Default::default())),
            Value::String(text) => serde_json::from_str(text).map_err(|e| VoiceError::InvalidArguments {
                function: self.name.clone(),
                reason: e.to_string(),
            }),
            other => Ok(other.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallInfo {
    pub id: Option<String>,
    pub customer: Option<Customer>,
}

impl CallInfo {
    pub fn caller_number(&self) -> Option<String> {
        self.customer
            .as_ref()
            .and_then(|c| c.number.clone())
            .filter(|n| !n.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Customer {
    pub number: Option<String>,
}

/// What the agent reads back after a tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
}

impl ToolResult {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self { success: true, message: message.into(), data: Some(data) }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), data: None }
    }

    /// The platform expects the result as a string.
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"message":"Failed to encode result","data":null}"#.to_string()
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResult {
    #[serde(rename = "toolCallId")]
    pub tool_call_id: String,
    pub result: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResponse {
    pub results: Vec<ToolCallResult>,
}

pub fn decode_arguments<T: DeserializeOwned>(function: &str, args: Value) -> Result<T, VoiceError> {
    serde_json::from_value(args).map_err(|e| VoiceError::InvalidArguments {
        function: function.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentArgs {
    #[serde(flatten)]
    pub patient: PatientLookup,
    pub doctor_id: Option<Uuid>,
    pub doctor_name: Option<String>,
    pub date: String,
    pub time: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAppointmentArgs {
    pub appointment_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorQueryArgs {
    pub name: Option<String>,
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketArgs {
    #[serde(flatten)]
    pub patient: PatientLookup,
    pub title: Option<String>,
    pub description: String,
    pub priority: Option<TicketPriority>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStatusArgs {
    pub ticket_number: Option<String>,
    pub ticket_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionListArgs {
    #[serde(flatten)]
    pub patient: PatientLookup,
    pub active_only: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionDetailsArgs {
    pub prescription_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VoiceError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid arguments for {function}: {reason}")]
    InvalidArguments { function: String, reason: String },

    #[error("Please provide a patient ID, email or phone number")]
    MissingPatientIdentifier,

    #[error("No patient profile found for the details provided")]
    PatientNotFound,

    #[error("No doctor found matching {0}")]
    DoctorNotFound(String),

    #[error("Could not understand the date {0}")]
    InvalidDate(String),

    #[error("{0} not found")]
    NotFound(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn test_tool_calls_message() {
        let request: VoiceWebhookRequest = serde_json::from_value(json!({
            "message": {
                "type": "tool-calls",
                "toolCallList": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "getAvailableDoctors", "arguments": "{\"specialty\":\"cardiology\"}"}
                }],
                "call": {"id": "c1", "customer": {"number": "+353871234567"}}
            }
        })).unwrap();

        match request.message {
            ServerMessage::ToolCalls { tool_call_list, call } => {
                assert_eq!(tool_call_list.len(), 1);
                let args = tool_call_list[0].function.arguments().unwrap();
                assert_eq!(args["specialty"], "cardiology");
                assert_eq!(call.unwrap().caller_number().as_deref(), Some("+353871234567"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_legacy_function_call_uses_parameters() {
        let request: VoiceWebhookRequest = serde_json::from_value(json!({
            "message": {
                "type": "function-call",
                "functionCall": {"name": "lookupDoctor", "parameters": {"name": "Murphy"}}
            }
        })).unwrap();

        match request.message {
            ServerMessage::FunctionCall { function_call, .. } => {
                assert_eq!(function_call.arguments().unwrap()["name"], "Murphy");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_other_message_types() {
        let request: VoiceWebhookRequest = serde_json::from_value(json!({
            "message": {"type": "end-of-call-report", "summary": "done"}
        })).unwrap();

        assert_matches!(request.message, ServerMessage::Other);
    }

    #[test]
    fn test_malformed_string_arguments() {
        let call = FunctionCall { name: "createAppointment".to_string(), arguments: json!("{not json") };
        assert_matches!(call.arguments(), Err(VoiceError::InvalidArguments { function, .. }) if function == "createAppointment");
    }

    #[test]
    fn test_tool_result_text() {
        let text = ToolResult::failure("nope").to_text();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, json!({"success": false, "message": "nope", "data": null}));
    }

    #[test]
    fn test_flattened_patient_lookup() {
        let args: CreateAppointmentArgs = decode_arguments("createAppointment", json!({
            "email": "aoife@example.com",
            "doctorName": "Dr. Murphy",
            "date": "2030-01-15",
            "time": "14:30"
        })).unwrap();

        assert_eq!(args.patient.email.as_deref(), Some("aoife@example.com"));
        assert_eq!(args.doctor_name.as_deref(), Some("Dr. Murphy"));
    }
}
