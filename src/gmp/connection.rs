// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::UnixStream,
    path::Path,
    time::Duration,
};

use quick_xml::events::Event;

use super::{Command, Credentials, Error, response::Response};

/// A response together with the XML it was parsed from
#[derive(Debug)]
pub struct Reply {
    pub raw: String,
    pub response: Response,
}

/// Reads exactly one XML element from the reader and returns it as text.
///
/// gvmd keeps the connection open after answering, so the end of a response
/// is the end of its root element rather than the end of the stream.
pub fn read_element<R: BufRead>(reader: &mut quick_xml::Reader<R>) -> Result<String, Error> {
    let mut writer = quick_xml::Writer::new(Vec::new());
    let mut buf = Vec::new();
    let mut depth = 0usize;
    loop {
        let event = reader.read_event_into(&mut buf)?;
        let done = match &event {
            Event::Start(_) => {
                depth += 1;
                false
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                depth == 0
            }
            Event::Empty(_) => depth == 0,
            Event::Eof => {
                return Err(Error::Unavailable(
                    "connection closed before the response was complete".to_string(),
                ));
            }
            _ => false,
        };
        // whitespace between two responses
        let skip = depth == 0 && !done && !matches!(event, Event::End(_));
        if !skip {
            writer.write_event(event)?;
        }
        buf.clear();
        if done {
            break;
        }
    }
    String::from_utf8(writer.into_inner()).map_err(|e| Error::Protocol(e.to_string()))
}

/// Checks the status of a response and returns it when it signals success.
pub fn verify(cmd: &Command, reply: Reply) -> Result<Reply, Error> {
    let status = reply.response.status();
    if !status.is_ok() {
        return Err(Error::Rejected {
            command: cmd.name().to_string(),
            status: status.code.into(),
            text: status.text.clone(),
        });
    }
    Ok(reply)
}

/// Authenticated connection to gvmd
pub struct Connection {
    reader: quick_xml::Reader<BufReader<UnixStream>>,
    writer: UnixStream,
}

impl Connection {
    /// Connects to the socket and authenticates.
    pub fn open<T: AsRef<Path>>(
        address: T,
        r_timeout: Option<Duration>,
        credentials: &Credentials,
    ) -> Result<Self, Error> {
        let socket = UnixStream::connect(address)?;
        if let Some(rtimeout) = r_timeout {
            if !rtimeout.is_zero() {
                socket.set_read_timeout(Some(rtimeout))?;
            }
        }
        let writer = socket.try_clone()?;
        let mut connection = Self {
            reader: quick_xml::Reader::from_reader(BufReader::new(socket)),
            writer,
        };
        connection.send(&Command::Authenticate {
            username: &credentials.username,
            password: &credentials.password,
        })?;
        Ok(connection)
    }

    /// Sends a command and returns the successful response.
    pub fn send(&mut self, cmd: &Command) -> Result<Reply, Error> {
        tracing::trace!(command = cmd.name(), "sending");
        self.writer.write_all(&cmd.try_to_xml()?)?;
        let raw = read_element(&mut self.reader)?;
        let response = quick_xml::de::from_str(&raw)?;
        verify(cmd, Reply { raw, response })
    }
}
