/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Kafka bindings for the notification channel traits.
//!
//! Manual acknowledgment maps onto Kafka's commit model: acknowledging a
//! message commits the offset past it; rejecting without requeue commits it
//! anyway (the message is dropped); rejecting with requeue seeks the
//! consumer back to the message's offset so it is redelivered.

use async_trait::async_trait;
use parking_lot::Mutex;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Message, Offset, TopicPartitionList};
use std::time::Duration;

use super::channel::{MessageChannel, MessageConsumer, RawMessage};
use crate::error::ChannelError;

const OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

fn producer_for(brokers: &str) -> Result<FutureProducer, ChannelError> {
    ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("message.timeout.ms", "5000")
        .create()
        .map_err(|e| ChannelError::Connection(e.to_string()))
}

/// Kafka-backed publish channel.
pub struct KafkaChannel {
    brokers: String,
    topic: String,
    producer: Mutex<FutureProducer>,
}

impl KafkaChannel {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, ChannelError> {
        Ok(Self {
            brokers: brokers.to_string(),
            topic: topic.to_string(),
            producer: Mutex::new(producer_for(brokers)?),
        })
    }
}

#[async_trait]
impl MessageChannel for KafkaChannel {
    async fn publish(&self, payload: &[u8]) -> Result<(), ChannelError> {
        let producer = self.producer.lock().clone();
        let record = FutureRecord::to(&self.topic).payload(payload).key("");
        producer
            .send(record, Timeout::After(OPERATION_TIMEOUT))
            .await
            .map(|_| ())
            .map_err(|(e, _)| ChannelError::Publish(e.to_string()))
    }

    async fn reconnect(&self) -> Result<(), ChannelError> {
        let fresh = producer_for(&self.brokers)?;
        *self.producer.lock() = fresh;
        Ok(())
    }
}

/// Kafka-backed consume channel with manual offset commits.
pub struct KafkaNoticeConsumer {
    consumer: StreamConsumer,
}

impl KafkaNoticeConsumer {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, ChannelError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| ChannelError::Connection(e.to_string()))?;
        consumer
            .subscribe(&[topic])
            .map_err(|e| ChannelError::Connection(e.to_string()))?;
        Ok(Self { consumer })
    }
}

#[async_trait]
impl MessageConsumer for KafkaNoticeConsumer {
    async fn next(&mut self) -> Option<Result<RawMessage, ChannelError>> {
        match self.consumer.recv().await {
            Ok(message) => Some(Ok(RawMessage {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                payload: message.payload().unwrap_or_default().to_vec(),
            })),
            Err(e) => Some(Err(ChannelError::Consume(e.to_string()))),
        }
    }

    async fn ack(&mut self, msg: &RawMessage) -> Result<(), ChannelError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(&msg.topic, msg.partition, Offset::Offset(msg.offset + 1))
            .map_err(|e| ChannelError::Consume(e.to_string()))?;
        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| ChannelError::Consume(e.to_string()))
    }

    async fn reject(&mut self, msg: &RawMessage, requeue: bool) -> Result<(), ChannelError> {
        if requeue {
            self.consumer
                .seek(
                    &msg.topic,
                    msg.partition,
                    Offset::Offset(msg.offset),
                    Timeout::After(OPERATION_TIMEOUT),
                )
                .map_err(|e| ChannelError::Consume(e.to_string()))
        } else {
            // Poison message: commit past it so it is never redelivered.
            self.ack(msg).await
        }
    }
}
