//! Shared contract suite for [`AnalyticsSink`] implementations.

use crate::sink::{AnalyticsSink, CollectorVariant, SinkCommand};
use thiserror::Error;

pub type DeliveredCommand = (CollectorVariant, SinkCommand);

/// Contract test expectations for sinks.
pub struct SinkContractSpec<'a, S: AnalyticsSink> {
    pub sink: &'a S,
    pub commands: Vec<DeliveredCommand>,
    /// Optional loader returning what the sink actually delivered, used to
    /// check completeness and ordering.
    pub load_delivered: Option<Box<dyn Fn() -> Vec<DeliveredCommand> + 'a>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkContractError {
    #[error("no commands supplied to contract")]
    NoCommands,
    #[error("sink rejected command: {0}")]
    SinkFailure(String),
    #[error("delivered commands shorter than submissions ({delivered} < {submitted})")]
    DeliveryTruncated { delivered: usize, submitted: usize },
    #[error("delivered command {index} does not match submission order")]
    DeliveryOutOfOrder { index: usize },
}

/// Run the shared sink contract suite against an implementation.
pub fn run_sink_contract<S: AnalyticsSink>(
    spec: SinkContractSpec<'_, S>,
) -> Result<(), SinkContractError> {
    if spec.commands.is_empty() {
        return Err(SinkContractError::NoCommands);
    }

    for (variant, command) in &spec.commands {
        spec.sink
            .send(*variant, command)
            .map_err(|e| SinkContractError::SinkFailure(e.to_string()))?;
    }

    if let Some(loader) = spec.load_delivered {
        let delivered = loader();
        if delivered.len() < spec.commands.len() {
            return Err(SinkContractError::DeliveryTruncated {
                delivered: delivered.len(),
                submitted: spec.commands.len(),
            });
        }
        // Sinks may hold earlier commands; compare the tail.
        let offset = delivered.len() - spec.commands.len();
        for (index, expected) in spec.commands.iter().enumerate() {
            if &delivered[offset + index] != expected {
                return Err(SinkContractError::DeliveryOutOfOrder { index });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{JsonLinesSink, RecordingSink, SinkResult};
    use std::io::Write;
    use std::sync::Mutex;

    fn sample_commands() -> Vec<DeliveredCommand> {
        vec![
            (
                CollectorVariant::Universal,
                SinkCommand::SetDimension {
                    key: "dimension1".into(),
                    value: "drama".into(),
                },
            ),
            (
                CollectorVariant::Universal,
                SinkCommand::SendEvent {
                    category: "Video".into(),
                    action: "contentReady".into(),
                    label: "Pilot".into(),
                },
            ),
            (
                CollectorVariant::Universal,
                SinkCommand::SendCustomMetric {
                    category: "Video".into(),
                    event: "playProgress".into(),
                    key: "metric1".into(),
                    value: 12.0,
                },
            ),
        ]
    }

    #[test]
    fn recording_sink_passes_contract() {
        let sink = RecordingSink::new();
        let spec = SinkContractSpec {
            sink: &sink,
            commands: sample_commands(),
            load_delivered: Some(Box::new(|| sink.commands())),
        };
        run_sink_contract(spec).unwrap();
    }

    #[test]
    fn json_lines_sink_passes_contract() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let sink = JsonLinesSink::new(file.reopen().unwrap());
        let spec = SinkContractSpec {
            sink: &sink,
            commands: sample_commands(),
            load_delivered: None,
        };
        run_sink_contract(spec).unwrap();

        let written = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(written.lines().count(), 3);
    }

    #[test]
    fn empty_contract_is_rejected() {
        let sink = RecordingSink::new();
        let spec = SinkContractSpec {
            sink: &sink,
            commands: Vec::new(),
            load_delivered: None,
        };
        assert_eq!(run_sink_contract(spec), Err(SinkContractError::NoCommands));
    }

    /// Sink that only keeps the last command it saw.
    struct ForgetfulSink {
        last: Mutex<Option<DeliveredCommand>>,
    }

    impl AnalyticsSink for ForgetfulSink {
        fn id(&self) -> &str {
            "forgetful"
        }

        fn send(&self, variant: CollectorVariant, command: &SinkCommand) -> SinkResult<()> {
            *self.last.lock().unwrap() = Some((variant, command.clone()));
            Ok(())
        }
    }

    #[test]
    fn truncated_delivery_is_reported() {
        let sink = ForgetfulSink {
            last: Mutex::new(None),
        };
        let spec = SinkContractSpec {
            sink: &sink,
            commands: sample_commands(),
            load_delivered: Some(Box::new(|| {
                sink.last.lock().unwrap().clone().into_iter().collect()
            })),
        };
        assert_eq!(
            run_sink_contract(spec),
            Err(SinkContractError::DeliveryTruncated {
                delivered: 1,
                submitted: 3
            })
        );
    }

    #[test]
    fn json_lines_sink_reports_write_failures() {
        struct BrokenPipe;

        impl Write for BrokenPipe {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let sink = JsonLinesSink::new(BrokenPipe);
        let spec = SinkContractSpec {
            sink: &sink,
            commands: sample_commands(),
            load_delivered: None,
        };
        assert!(matches!(
            run_sink_contract(spec),
            Err(SinkContractError::SinkFailure(_))
        ));
    }
}
