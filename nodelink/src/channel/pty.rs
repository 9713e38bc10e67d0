//! [`Shell`] over an SSH PTY channel.

use std::time::Duration;

use async_trait::async_trait;
use log::trace;
use regex::bytes::Regex;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::time::Instant;

use super::Shell;
use super::buffer::PatternBuffer;
use crate::transport::TransportError;

pub struct PtyChannel {
    channel: Channel<Msg>,
    buffer: PatternBuffer,
}

impl PtyChannel {
    pub fn new(channel: Channel<Msg>, search_depth: usize) -> Self {
        Self {
            channel,
            buffer: PatternBuffer::new(search_depth),
        }
    }
}

#[async_trait]
impl Shell for PtyChannel {
    async fn send(&mut self, line: &str) -> Result<(), TransportError> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.channel.data(bytes.as_slice()).await?;
        trace!("pty: sent {} bytes", bytes.len());
        Ok(())
    }

    async fn read_until(&mut self, pattern: &Regex, timeout: Duration) -> Result<String, TransportError> {
        let deadline = Instant::now() + timeout;
        while !self.buffer.tail_matches(pattern) {
            let msg = tokio::time::timeout_at(deadline, self.channel.wait())
                .await
                .map_err(|_| TransportError::PromptTimeout(timeout))?;
            match msg {
                Some(ChannelMsg::Data { data }) => self.buffer.push(&data),
                Some(ChannelMsg::ExtendedData { data, .. }) => self.buffer.push(&data),
                Some(ChannelMsg::Eof | ChannelMsg::Close) | None => {
                    return Err(TransportError::Disconnected);
                }
                Some(_) => {}
            }
        }

        let text = self.buffer.take_text();
        trace!("pty: < {text:?}");
        Ok(text)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.channel.eof().await?;
        self.channel.close().await?;
        Ok(())
    }
}
