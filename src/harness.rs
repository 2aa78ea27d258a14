//! Helpers for integration tests that send mail into a Sendria server and
//! then check what arrived.
//!
//! ```no_run
//! use sendria::api::{Client, Transport};
//! use sendria::harness::Mailbox;
//!
//! fn welcome_mail_is_sent<T: Transport>(transport: T) -> sendria::error::Result<()> {
//!     let mailbox = Mailbox::new(Client::new("", transport));
//!     mailbox.clear()?;
//!     // ... trigger the code under test ...
//!     let msg = mailbox.wait_for_subject("Welcome")?;
//!     mailbox.assert_content(&msg, &["activate your account"])
//! }
//! ```

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::api::{Client, Transport};
use crate::config::ServerConfig;
use crate::error::{Result, SendriaError};
use crate::model::message::Message;
use crate::model::recipient::Recipient;

const CLEAR_ATTEMPTS: usize = 3;

/// A captured mailbox seen through a [`Client`].
pub struct Mailbox<T> {
    client: Client<T>,
    poll_interval: Duration,
    timeout: Duration,
    per_page: u32,
}

impl<T: Transport> Mailbox<T> {
    /// Poll every 50 ms, give up after 3 s, look at up to 100 messages.
    pub fn new(client: Client<T>) -> Self {
        Self {
            client,
            poll_interval: Duration::from_millis(50),
            timeout: Duration::from_secs(3),
            per_page: 100,
        }
    }

    /// Take polling settings from the `[server]` config section.
    pub fn from_config(client: Client<T>, server: &ServerConfig) -> Self {
        Self::new(client)
            .with_poll_interval(Duration::from_millis(server.poll_interval_ms))
            .with_timeout(Duration::from_millis(server.wait_timeout_ms))
            .with_per_page(server.per_page)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Default timeout of the `wait_for_*` shorthands.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn client(&self) -> &Client<T> {
        &self.client
    }

    /// Delete every captured message, retrying transient failures.
    pub fn clear(&self) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.client.delete_all_messages() {
                Ok(()) => return Ok(()),
                Err(e) if attempt < CLEAR_ATTEMPTS => {
                    warn!(attempt, error = %e, "Clearing mailbox failed, retrying");
                    attempt += 1;
                    thread::sleep(self.poll_interval);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Current messages, newest first.
    pub fn messages(&self) -> Result<Vec<Message>> {
        Ok(self.client.list_messages(1, self.per_page)?.messages)
    }

    /// Number of messages captured right now.
    pub fn count(&self) -> Result<usize> {
        Ok(self.messages()?.len())
    }

    /// Newest message matching the given recipient and/or subject, without
    /// waiting. `None` filters match anything.
    pub fn find(&self, to: Option<&str>, subject: Option<&str>) -> Result<Option<Message>> {
        let found = self.messages()?.into_iter().find(|m| {
            to.is_none_or(|email| m.is_addressed_to(email))
                && subject.is_none_or(|s| m.subject == s)
        });
        Ok(found)
    }

    /// Poll until a message satisfies `pred`.
    pub fn wait_for<P>(&self, pred: P, timeout: Duration) -> Result<Message>
    where
        P: Fn(&Message) -> bool,
    {
        self.poll("a matching message", timeout, |messages| {
            messages.iter().find(|m| pred(m)).cloned()
        })
    }

    pub fn wait_for_subject(&self, subject: &str) -> Result<Message> {
        self.poll(&format!("subject {subject:?}"), self.timeout, |messages| {
            messages.iter().find(|m| m.subject == subject).cloned()
        })
    }

    pub fn wait_for_recipient(&self, email: &str) -> Result<Message> {
        self.poll(&format!("recipient {email}"), self.timeout, |messages| {
            messages.iter().find(|m| m.is_addressed_to(email)).cloned()
        })
    }

    /// Wait for a message to `to` with exactly `subject`.
    pub fn wait_for_email(&self, to: &str, subject: &str) -> Result<Message> {
        self.poll(
            &format!("recipient {to} with subject {subject:?}"),
            self.timeout,
            |messages| {
                messages
                    .iter()
                    .find(|m| m.is_addressed_to(to) && m.subject == subject)
                    .cloned()
            },
        )
    }

    /// Wait until at least `count` messages exist; returns the newest `count`.
    pub fn wait_for_count(&self, count: usize, timeout: Duration) -> Result<Vec<Message>> {
        self.poll(&format!("{count} message(s)"), timeout, |messages| {
            (messages.len() >= count).then(|| messages[..count].to_vec())
        })
    }

    /// The newest message, waiting for one to arrive.
    pub fn latest(&self) -> Result<Message> {
        let mut newest = self.wait_for_count(1, self.timeout)?;
        Ok(newest.remove(0))
    }

    /// Fail unless exactly `expected` messages are captured right now.
    pub fn assert_count(&self, expected: usize) -> Result<()> {
        let messages = self.messages()?;
        if messages.len() != expected {
            self.log_messages(&messages);
            return Err(SendriaError::Assertion(format!(
                "expected {expected} message(s), found {}",
                messages.len()
            )));
        }
        Ok(())
    }

    /// Sleep for `settle`, then fail if anything was captured.
    pub fn assert_empty_after(&self, settle: Duration) -> Result<()> {
        thread::sleep(settle);
        self.assert_count(0)
    }

    /// Fail unless the server's plain-text rendering of `message` contains
    /// every one of `expected`.
    pub fn assert_content(&self, message: &Message, expected: &[&str]) -> Result<()> {
        let body = self.client.get_message_plain(&message.id)?;
        let missing: Vec<&str> = expected
            .iter()
            .copied()
            .filter(|text| !body.contains(text))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        debug!(id = %message.id, body = %body, "Message body");
        Err(SendriaError::Assertion(format!(
            "message {} is missing {missing:?}",
            message.id
        )))
    }

    /// First URL in the plain-text rendering of `message` on a line that
    /// contains `pattern`.
    ///
    /// Only lines starting with `http` (after trimming) are considered; the
    /// URL ends at the first whitespace.
    pub fn extract_link(&self, message: &Message, pattern: &str) -> Result<String> {
        let body = self.client.get_message_plain(&message.id)?;
        let link = body
            .lines()
            .map(str::trim)
            .filter(|line| line.contains(pattern) && line.starts_with("http"))
            .find_map(|line| line.split_whitespace().next());
        match link {
            Some(url) => Ok(url.to_string()),
            None => {
                debug!(id = %message.id, body = %body, "Message body");
                Err(SendriaError::Assertion(format!(
                    "message {} has no link matching {pattern:?}",
                    message.id
                )))
            }
        }
    }

    /// Log one message with its plain-text and HTML renderings.
    pub fn debug_message(&self, message: &Message) {
        let to: Vec<&str> = message.to.iter().map(|r| r.email.as_str()).collect();
        info!(
            id = %message.id,
            from = first_email(&message.from),
            to = ?to,
            subject = %message.subject,
            created_at = %message.created_at,
            "Message"
        );
        match self.client.get_message_plain(&message.id) {
            Ok(plain) => info!(id = %message.id, "Plain body:\n{plain}"),
            Err(e) => debug!(id = %message.id, error = %e, "No plain body"),
        }
        match self.client.get_message_html(&message.id) {
            Ok(html) if !html.is_empty() => info!(id = %message.id, "HTML body:\n{html}"),
            Ok(_) => {}
            Err(e) => debug!(id = %message.id, error = %e, "No HTML body"),
        }
    }

    /// Log every captured message, for diagnosing a failed test.
    pub fn dump(&self) -> Result<()> {
        let messages = self.messages()?;
        self.log_messages(&messages);
        Ok(())
    }

    fn log_messages(&self, messages: &[Message]) {
        info!(count = messages.len(), "Captured messages");
        for (i, msg) in messages.iter().enumerate() {
            info!(
                index = i + 1,
                from = first_email(&msg.from),
                to = first_email(&msg.to),
                subject = %msg.subject,
                "Captured message"
            );
        }
    }

    fn poll<R, F>(&self, what: &str, timeout: Duration, mut check: F) -> Result<R>
    where
        F: FnMut(&[Message]) -> Option<R>,
    {
        let start = Instant::now();
        loop {
            let messages = self.messages()?;
            if let Some(found) = check(&messages) {
                debug!(what, elapsed_ms = start.elapsed().as_millis() as u64, "Wait satisfied");
                return Ok(found);
            }

            let waited = start.elapsed();
            if waited >= timeout {
                self.log_messages(&messages);
                return Err(SendriaError::Timeout {
                    what: what.to_string(),
                    waited_ms: waited.as_millis(),
                    seen: messages.len(),
                });
            }
            thread::sleep(self.poll_interval.min(timeout - waited));
        }
    }
}

fn first_email(list: &[Recipient]) -> &str {
    list.first().map_or("<empty>", |r| r.email.as_str())
}
