//! Support for Otii Arc/Ace power analyzers through the Otii TCP server.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use json::JsonValue;
use log::{debug, info, trace};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::facility::{MeterError, PowerAnalyzer, Result};
use crate::measurement::{ChannelStatistics, MeasurementWindow};

/// How to reach and configure the analyzer.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyzerSettings {
    pub host: String,
    pub port: u16,
    /// Main output voltage (V).
    pub main_voltage: f64,
    /// Expansion port voltage (V).
    pub exp_voltage: f64,
    /// Current limit (A).
    pub max_current: f64,
    /// Channels enabled before recording.
    pub channels: Vec<String>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        AnalyzerSettings {
            host: "127.0.0.1".to_string(),
            port: 1905,
            main_voltage: 5.1,
            exp_voltage: 4.9,
            max_current: 2.5,
            channels: vec!["mp".to_string(), "mc".to_string()],
        }
    }
}

/// Connection to an Otii TCP server speaking newline-delimited JSON.
#[derive(Debug)]
pub struct OtiiClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    next_transaction: u64,
}

impl OtiiClient {
    const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connect to the server at `host:port`.
    pub fn connect(host: &str, port: u16) -> Result<OtiiClient> {
        info!("otii: connecting to {}:{}", host, port);
        let stream = TcpStream::connect((host, port))?;
        stream.set_read_timeout(Some(Self::RESPONSE_TIMEOUT))?;
        let writer = stream.try_clone()?;

        Ok(OtiiClient {
            reader: BufReader::new(stream),
            writer,
            next_transaction: 1,
        })
    }

    /// Issue a command and return the `data` member of its response.
    pub fn request(&mut self, command: &str, data: JsonValue) -> Result<Value> {
        let trans_id = self.next_transaction.to_string();
        self.next_transaction += 1;

        let mut message = JsonValue::new_object();
        message["type"] = "request".into();
        message["cmd"] = command.into();
        message["trans_id"] = trans_id.as_str().into();
        message["data"] = data;

        trace!("otii: -> {}", message.dump());
        let mut line = message.dump();
        line.push_str("\r\n");
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;

        self.await_response(command, &trans_id)
    }

    /// Issue a command and decode its `data` member.
    fn request_as<T: DeserializeOwned>(&mut self, command: &str, data: JsonValue) -> Result<T> {
        let value = self.request(command, data)?;
        serde_json::from_value(value)
            .map_err(|e| MeterError::Protocol(format!("unexpected '{}' response: {}", command, e)))
    }

    fn await_response(&mut self, command: &str, trans_id: &str) -> Result<Value> {
        loop {
            let mut line = String::new();
            let read = self.reader.read_line(&mut line)?;
            if read == 0 {
                return Err(MeterError::Protocol("server closed the connection".to_string()));
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            trace!("otii: <- {}", line);

            let message: Value = serde_json::from_str(line)
                .map_err(|e| MeterError::Protocol(format!("malformed message: {}", e)))?;
            if message["trans_id"].as_str() != Some(trans_id) {
                // Unsolicited information and event messages.
                continue;
            }

            return match message["type"].as_str() {
                Some("response") => Ok(message["data"].clone()),
                Some("error") => Err(MeterError::Device {
                    command: command.to_string(),
                    code: message["errorcode"].as_str().unwrap_or("unknown").to_string(),
                    message: message["data"]["message"].as_str().unwrap_or("").to_string(),
                }),
                other => Err(MeterError::Protocol(format!("unexpected message type {:?}", other))),
            };
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    devices: Vec<DeviceInfo>,
}

#[derive(Debug, Deserialize)]
struct DeviceInfo {
    device_id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProjectId {
    project_id: i64,
}

#[derive(Debug, Deserialize)]
struct RecordingId {
    recording_id: i64,
}

#[derive(Debug, Deserialize)]
struct ChannelInfo {
    from: f64,
    to: f64,
    #[serde(default)]
    offset: f64,
    sample_rate: u32,
}

#[derive(Debug, Deserialize)]
struct Statistics {
    min: f64,
    max: f64,
    average: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum RecordingState {
    Idle,
    Recording,
    Stopped,
}

/// An Otii device with its active project, ready to record.
#[derive(Debug)]
pub struct Otii {
    client: OtiiClient,
    device_id: String,
    project_id: i64,
    state: RecordingState,
    last_recording: Option<i64>,
}

impl Otii {
    /** Configure the first attached device and take the active project.

    Sets supply voltages and current limit and enables the configured
    channels. Fails with [`MeterError::NoDevice`] when nothing is attached.
     */
    pub fn setup(mut client: OtiiClient, settings: &AnalyzerSettings) -> Result<Otii> {
        let timeout = 10;
        let list: DeviceList = client.request_as("otii_get_devices", json::object! { timeout: timeout })?;
        let device = list.devices.into_iter()
            .next()
            .ok_or(MeterError::NoDevice)?;
        info!("otii: using device '{}' ({})", device.name, device.device_id);

        let device_id = device.device_id.as_str();
        let main_voltage = settings.main_voltage;
        let exp_voltage = settings.exp_voltage;
        let max_current = settings.max_current;
        client.request("arc_set_main_voltage", json::object! { device_id: device_id, value: main_voltage })?;
        client.request("arc_set_exp_voltage", json::object! { device_id: device_id, value: exp_voltage })?;
        client.request("arc_set_max_current", json::object! { device_id: device_id, value: max_current })?;

        for channel in &settings.channels {
            let channel = channel.as_str();
            client.request("arc_enable_channel",
                           json::object! { device_id: device_id, channel: channel, enable: true })?;
            debug!("otii: enabled channel '{}'", channel);
        }

        let project: ProjectId = client.request_as("otii_get_active_project", JsonValue::new_object())?;
        if project.project_id < 0 {
            return Err(MeterError::Protocol("no active project".to_string()));
        }
        info!("otii: recording into project {}", project.project_id);

        Ok(Otii {
            client,
            device_id: device.device_id,
            project_id: project.project_id,
            state: RecordingState::Idle,
            last_recording: None,
        })
    }

    fn project_data(&self) -> JsonValue {
        let project_id = self.project_id;
        json::object! { project_id: project_id }
    }

    fn query_last_recording(&mut self) -> Result<i64> {
        let data = self.project_data();
        let recording: RecordingId = self.client.request_as("project_get_last_recording", data)?;
        if recording.recording_id < 0 {
            Err(MeterError::NoRecordingAvailable)
        } else {
            Ok(recording.recording_id)
        }
    }
}

impl PowerAnalyzer for Otii {
    fn start(&mut self) -> Result<()> {
        if self.state == RecordingState::Recording {
            return Err(MeterError::Protocol("recording already in progress".to_string()));
        }
        let data = self.project_data();
        self.client.request("project_start_recording", data)?;
        self.state = RecordingState::Recording;
        self.last_recording = None;
        debug!("otii: recording started");

        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.state != RecordingState::Recording {
            return Err(MeterError::Protocol("no recording in progress".to_string()));
        }
        let data = self.project_data();
        let stopped = self.client.request("project_stop_recording", data);

        // A recording whose stop failed is not trusted for statistics.
        self.state = match stopped {
            Ok(_) => RecordingState::Stopped,
            Err(_) => RecordingState::Idle,
        };
        stopped?;
        debug!("otii: recording stopped");

        Ok(())
    }

    fn fetch_window_and_statistics(&mut self, channel: &str)
                                   -> Result<(MeasurementWindow, ChannelStatistics)>
    {
        if self.state != RecordingState::Stopped {
            return Err(MeterError::NoRecordingAvailable);
        }

        let recording_id = self.query_last_recording()?;
        self.last_recording = Some(recording_id);

        let device_id = self.device_id.as_str();
        let info = self.client.request_as::<ChannelInfo>(
            "recording_get_channel_info",
            json::object! { recording_id: recording_id, device_id: device_id, channel: channel });
        let info = match info {
            Ok(info) => info,
            Err(MeterError::Device { code, message, .. }) => {
                debug!("otii: no '{}' data in recording {}: {} {}", channel, recording_id, code, message);
                return Err(MeterError::NoRecordingAvailable);
            },
            Err(e) => return Err(e),
        };

        if info.to < info.from {
            return Err(MeterError::Protocol(
                format!("recording {} ends before it starts ({} > {})", recording_id, info.from, info.to)));
        }

        let (from, to) = (info.from, info.to);
        let stats: Statistics = self.client.request_as(
            "recording_get_channel_statistics",
            json::object! {
                recording_id: recording_id,
                device_id: device_id,
                channel: channel,
                from: from,
                to: to
            })?;

        let window = MeasurementWindow {
            start: info.from,
            end: info.to,
            offset: info.offset,
            sample_rate: info.sample_rate,
        };
        let statistics = ChannelStatistics {
            minimum: stats.min,
            maximum: stats.max,
            average: stats.average,
        };

        Ok((window, statistics))
    }

    fn label(&mut self, name: &str) -> Result<()> {
        let recording_id = match self.last_recording {
            Some(id) => id,
            None => self.query_last_recording()?,
        };
        self.client.request("recording_rename", json::object! { recording_id: recording_id, name: name })?;
        debug!("otii: recording {} labelled '{}'", recording_id, name);

        Ok(())
    }
}
