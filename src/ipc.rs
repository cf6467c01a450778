// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! IPC framing for record message sets.
//!
//! One Arrow IPC stream per schema ID on both sides: the writer emits the
//! schema preamble only when a schema ID first appears, and the reader keeps
//! a stream reader per schema ID so later batches skip the schema handshake.
//! A schema change (new schema ID for a payload type already seen) starts a
//! fresh stream and evicts the stale reader.

use ahash::RandomState;
use arrow_ipc::reader::StreamReader;
use arrow_ipc::writer::StreamWriter;
use std::collections::HashMap;
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::payload::{PayloadType, RecordMessage};

/// One serialized record with its framing metadata.
#[derive(Debug, Clone)]
pub struct SerializedPayload {
    /// Schema identifier; selects the IPC stream.
    pub schema_id: String,
    /// Wire tag of the payload type.
    pub payload_type: i32,
    /// IPC bytes: schema preamble (first use of the schema id) plus the
    /// record batch.
    pub record: Vec<u8>,
}

/// One serialized batch.
#[derive(Debug, Clone)]
pub struct SerializedBatch {
    /// Batch identifier shared by all payloads.
    pub batch_id: String,
    /// The payloads, in record-message order.
    pub payloads: Vec<SerializedPayload>,
}

/// Serializes record messages, one IPC stream per schema ID.
#[derive(Default)]
pub struct StreamProducer {
    writers: HashMap<String, StreamWriter<Vec<u8>>, RandomState>,
}

impl StreamProducer {
    /// An empty producer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize one batch's record messages.
    pub fn serialize(&mut self, messages: &[RecordMessage]) -> Result<SerializedBatch> {
        let batch_id = messages
            .first()
            .map(|m| m.batch_id.clone())
            .unwrap_or_default();
        let mut payloads = Vec::with_capacity(messages.len());
        for message in messages {
            payloads.push(self.serialize_message(message)?);
        }
        Ok(SerializedBatch { batch_id, payloads })
    }

    fn serialize_message(&mut self, message: &RecordMessage) -> Result<SerializedPayload> {
        if !self.writers.contains_key(&message.schema_id) {
            let writer = StreamWriter::try_new(Vec::new(), message.record.schema_ref())
                .map_err(|source| Error::BuildStreamWriter { source })?;
            let _ = self.writers.insert(message.schema_id.clone(), writer);
        }
        let writer = self.writers.get_mut(&message.schema_id).ok_or_else(|| {
            Error::UnexpectedRecordBatchState {
                reason: "stream writer missing".to_owned(),
            }
        })?;
        writer
            .write(&message.record)
            .map_err(|source| Error::WriteRecordBatch { source })?;
        let bytes = std::mem::take(writer.get_mut());
        Ok(SerializedPayload {
            schema_id: message.schema_id.clone(),
            payload_type: message.payload_type as i32,
            record: bytes,
        })
    }
}

/// Deserializes payloads, one IPC stream reader per schema ID.
#[derive(Default)]
pub struct StreamConsumer {
    readers: HashMap<String, (PayloadType, StreamReader<Cursor<Vec<u8>>>), RandomState>,
}

impl StreamConsumer {
    /// An empty consumer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserialize one batch back into record messages.
    pub fn deserialize(&mut self, batch: &SerializedBatch) -> Result<Vec<RecordMessage>> {
        let mut messages = Vec::with_capacity(batch.payloads.len());
        for payload in &batch.payloads {
            messages.push(self.deserialize_payload(&batch.batch_id, payload)?);
        }
        Ok(messages)
    }

    fn deserialize_payload(
        &mut self,
        batch_id: &str,
        payload: &SerializedPayload,
    ) -> Result<RecordMessage> {
        let payload_type = PayloadType::try_from_wire(payload.payload_type)?;

        if self.readers.contains_key(&payload.schema_id) {
            if let Some((_, reader)) = self.readers.get_mut(&payload.schema_id) {
                *reader.get_mut() = Cursor::new(payload.record.clone());
            }
        } else {
            // a new schema id for an already-seen payload type means the
            // schema changed; the old stream is dead
            self.readers.retain(|_, (seen, _)| *seen != payload_type);
            let reader = StreamReader::try_new(Cursor::new(payload.record.clone()), None)
                .map_err(|source| Error::BuildStreamReader { source })?;
            let _ = self
                .readers
                .insert(payload.schema_id.clone(), (payload_type, reader));
        }
        let (_, reader) = self.readers.get_mut(&payload.schema_id).ok_or_else(|| {
            Error::UnexpectedRecordBatchState {
                reason: "stream reader missing".to_owned(),
            }
        })?;

        let record = reader
            .next()
            .ok_or_else(|| Error::UnexpectedRecordBatchState {
                reason: format!("no record batch in stream for schema {}", payload.schema_id),
            })?
            .map_err(|source| Error::ReadRecordBatch { source })?;

        Ok(RecordMessage {
            batch_id: batch_id.to_owned(),
            schema_id: payload.schema_id.clone(),
            payload_type,
            record,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encode::producer::MetricsProducer;
    use crate::otlp::metrics::{
        Gauge, Metric, MetricsData, NumberDataPoint, ResourceMetrics, ScopeMetrics,
    };

    fn batch(names: &[&str]) -> MetricsData {
        MetricsData::new(vec![ResourceMetrics {
            resource: None,
            scope_metrics: vec![ScopeMetrics {
                scope: None,
                metrics: names
                    .iter()
                    .map(|name| {
                        Metric::new_gauge(*name, Gauge::new(vec![NumberDataPoint::new_int(1, 1)]))
                    })
                    .collect(),
                schema_url: String::new(),
            }],
            schema_url: String::new(),
        }])
    }

    #[test]
    fn test_ipc_round_trip() {
        let mut producer = MetricsProducer::default();
        let messages = producer.produce(&batch(&["m1", "m2"])).unwrap();

        let mut writer = StreamProducer::new();
        let mut reader = StreamConsumer::new();

        let serialized = writer.serialize(&messages).unwrap();
        let decoded = reader.deserialize(&serialized).unwrap();

        assert_eq!(decoded.len(), messages.len());
        for (a, b) in messages.iter().zip(decoded.iter()) {
            assert_eq!(a.payload_type, b.payload_type);
            assert_eq!(a.schema_id, b.schema_id);
            assert_eq!(a.record, b.record);
        }
    }

    #[test]
    fn test_second_batch_skips_schema_preamble() {
        let mut producer = MetricsProducer::default();
        let first = producer.produce(&batch(&["m1"])).unwrap();
        let second = producer.produce(&batch(&["m1"])).unwrap();

        let mut writer = StreamProducer::new();
        let first_bytes = writer.serialize(&first).unwrap();
        let second_bytes = writer.serialize(&second).unwrap();

        // same schema id, so the second serialization is schema-free and
        // strictly smaller
        assert_eq!(
            first_bytes.payloads[0].schema_id,
            second_bytes.payloads[0].schema_id
        );
        assert!(second_bytes.payloads[0].record.len() < first_bytes.payloads[0].record.len());

        let mut reader = StreamConsumer::new();
        let _ = reader.deserialize(&first_bytes).unwrap();
        let decoded = reader.deserialize(&second_bytes).unwrap();
        assert_eq!(decoded[0].record, second[0].record);
    }
}
