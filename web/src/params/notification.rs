use std::collections::HashMap;

use events::Message;
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

/// Request body for publishing a notification to every connected subscriber.
#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct PublishParams {
    /// Message id; a random UUID is assigned when omitted.
    pub(crate) id: Option<String>,
    /// SSE `event:` name for the record.
    pub(crate) event: Option<String>,
    /// Arbitrary JSON sent as the record's `data:`.
    #[schema(value_type = Object)]
    pub(crate) payload: Value,
    #[serde(default)]
    pub(crate) metadata: HashMap<String, String>,
}

impl PublishParams {
    pub(crate) fn into_message(self) -> Message<Value> {
        let mut message = match self.id {
            Some(id) => Message::with_id(id, self.payload),
            None => Message::new(self.payload),
        };

        for (key, value) in self.metadata {
            message = message.with_metadata(key, value);
        }

        // An explicit `event` wins over one smuggled in through metadata.
        if let Some(event) = self.event {
            message = message.with_event_type(event);
        }

        message
    }
}
