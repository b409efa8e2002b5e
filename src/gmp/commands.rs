// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event, attributes::Attribute};

use super::{Error, TaskDefinition};

/// GMP command
#[derive(Debug, Clone, Copy)]
pub enum Command<'a> {
    /// Authenticates the connection, must be the first command sent.
    Authenticate {
        username: &'a str,
        password: &'a str,
    },
    /// Lists targets with exactly the given name.
    GetTargets { name: &'a str },
    /// Creates a target.
    CreateTarget {
        name: &'a str,
        hosts: &'a str,
        /// gvmd port range, the backend default port list is used when None
        port_range: Option<&'a str>,
        alive_test: &'a str,
    },
    /// Lists all scanners.
    GetScanners,
    /// Creates a task for an existing target.
    CreateTask(&'a TaskDefinition),
    /// Starts a task.
    StartTask { task_id: &'a str },
    /// Gets a single task including its status.
    GetTasks { task_id: &'a str },
    /// Gets a report with result details.
    GetReports { report_id: &'a str, rows: i64 },
}

type Result<T> = std::result::Result<T, Error>;
type Writer = quick_xml::Writer<Cursor<Vec<u8>>>;

impl Command<'_> {
    /// Name of the command element.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Authenticate { .. } => "authenticate",
            Command::GetTargets { .. } => "get_targets",
            Command::CreateTarget { .. } => "create_target",
            Command::GetScanners => "get_scanners",
            Command::CreateTask(_) => "create_task",
            Command::StartTask { .. } => "start_task",
            Command::GetTasks { .. } => "get_tasks",
            Command::GetReports { .. } => "get_reports",
        }
    }

    /// Returns the XML representation of the command.
    pub fn try_to_xml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        let name = self.name();
        match self {
            Command::Authenticate { username, password } => {
                writer.within_element(name, &[], &mut |writer| {
                    writer.within_element("credentials", &[], &mut |writer| {
                        write_str_element(writer, "username", username)?;
                        write_str_element(writer, "password", password)
                    })
                })?
            }
            Command::GetTargets { name: target } => {
                let filter = format!("name=\"{target}\" rows=-1");
                writer.empty_element(name, &[("filter", filter.as_str())])?
            }
            Command::CreateTarget {
                name: target,
                hosts,
                port_range,
                alive_test,
            } => writer.within_element(name, &[], &mut |writer| {
                write_str_element(writer, "name", target)?;
                write_str_element(writer, "hosts", hosts)?;
                if let Some(range) = port_range {
                    write_str_element(writer, "port_range", range)?;
                }
                write_str_element(writer, "alive_tests", alive_test)
            })?,
            Command::GetScanners => writer.empty_element(name, &[])?,
            Command::CreateTask(task) => writer.within_element(name, &[], &mut |writer| {
                write_str_element(writer, "name", &task.name)?;
                write_str_element(writer, "comment", &task.comment)?;
                writer.empty_element("config", &[("id", task.config_id.as_str())])?;
                writer.empty_element("target", &[("id", task.target_id.as_str())])?;
                writer.empty_element("scanner", &[("id", task.scanner_id.as_str())])
            })?,
            Command::StartTask { task_id } | Command::GetTasks { task_id } => {
                writer.empty_element(name, &[("task_id", *task_id)])?
            }
            Command::GetReports { report_id, rows } => {
                let filter = format!("rows={rows}");
                writer.empty_element(
                    name,
                    &[
                        ("report_id", *report_id),
                        ("details", "1"),
                        ("ignore_pagination", "0"),
                        ("filter", filter.as_str()),
                    ],
                )?
            }
        }
        Ok(writer.into_inner().into_inner())
    }
}

trait WithinElement {
    /// Writes an element with the given attributes and lets `f` write the content.
    fn within_element<F>(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        f: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&mut Self) -> Result<()> + ?Sized;

    /// Writes a self closing element with the given attributes.
    fn empty_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()>;
}

fn start<'a>(name: &'a str, attributes: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    let mut elem = BytesStart::new(name);
    for attr in attributes {
        elem.push_attribute(Attribute::from(*attr));
    }
    elem
}

impl WithinElement for Writer {
    fn within_element<F>(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        f: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&mut Self) -> Result<()> + ?Sized,
    {
        self.write_event(Event::Start(start(name, attributes)))?;
        f(self)?;
        self.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        self.write_event(Event::Empty(start(name, attributes)))?;
        Ok(())
    }
}

fn write_str_element(writer: &mut Writer, name: &str, value: &str) -> Result<()> {
    writer.within_element(name, &[], &mut |writer| {
        writer.write_event(Event::Text(BytesText::new(value)))?;
        Ok(())
    })
}
