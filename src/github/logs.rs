//! Actions job-log parsing.
//!
//! Raw job logs are plain text where every line carries a leading ISO
//! timestamp and the runner brackets each step with `##[group]` /
//! `##[endgroup]` markers. Parsing strips the timestamps and groups lines
//! into named sections so the renderer can attach them to job steps.

use chrono::DateTime;

/// One `##[group]`-delimited span of a job log. Lines before the first
/// group marker land in an unnamed section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSection {
    pub name: Option<String>,
    pub lines: Vec<String>,
}

/// A parsed job log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobLog {
    pub sections: Vec<LogSection>,
}

impl JobLog {
    /// Find the section for a step, matching the runner's `Run <step>` /
    /// bare-name group titles.
    #[must_use]
    pub fn section_for_step<'a>(&'a self, step_name: &str) -> Option<&'a LogSection> {
        self.sections.iter().find(|s| {
            s.name
                .as_deref()
                .is_some_and(|n| n == step_name || n == format!("Run {step_name}"))
        })
    }
}

const GROUP_MARKER: &str = "##[group]";
const ENDGROUP_MARKER: &str = "##[endgroup]";

/// Parse raw job-log text into timestamp-free sections.
#[must_use]
pub fn parse_job_log(text: &str) -> JobLog {
    let mut log = JobLog::default();
    let mut current: Option<LogSection> = None;

    for raw_line in text.lines() {
        let line = strip_timestamp(raw_line);

        if let Some(name) = line.strip_prefix(GROUP_MARKER) {
            if let Some(section) = current.take() {
                log.sections.push(section);
            }
            current = Some(LogSection {
                name: Some(name.trim().to_string()),
                lines: Vec::new(),
            });
            continue;
        }

        if line.starts_with(ENDGROUP_MARKER) {
            if let Some(section) = current.take() {
                log.sections.push(section);
            }
            continue;
        }

        let section = current.get_or_insert_with(|| LogSection {
            name: None,
            lines: Vec::new(),
        });
        section.lines.push(line.to_string());
    }

    if let Some(section) = current.take() {
        log.sections.push(section);
    }

    log
}

/// Strip the leading runner timestamp (`2024-03-01T10:00:00.1234567Z `)
/// when present; lines without one pass through unchanged.
fn strip_timestamp(line: &str) -> &str {
    let Some((prefix, rest)) = line.split_once(' ') else {
        return line;
    };
    if DateTime::parse_from_rfc3339(prefix).is_ok() {
        rest
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_timestamps_and_groups_steps() {
        let text = "\
2024-03-01T10:00:00.1234567Z prep line
2024-03-01T10:00:01.0000000Z ##[group]Run cargo test
2024-03-01T10:00:02.0000000Z running 3 tests
2024-03-01T10:00:03.0000000Z test result: ok
2024-03-01T10:00:04.0000000Z ##[endgroup]
2024-03-01T10:00:05.0000000Z Cleaning up
";
        let log = parse_job_log(text);
        assert_eq!(log.sections.len(), 3);

        assert_eq!(log.sections[0].name, None);
        assert_eq!(log.sections[0].lines, vec!["prep line"]);

        assert_eq!(log.sections[1].name.as_deref(), Some("Run cargo test"));
        assert_eq!(
            log.sections[1].lines,
            vec!["running 3 tests", "test result: ok"]
        );

        assert_eq!(log.sections[2].name, None);
        assert_eq!(log.sections[2].lines, vec!["Cleaning up"]);
    }

    #[test]
    fn lines_without_timestamps_pass_through() {
        let log = parse_job_log("no timestamp here\nanother line\n");
        assert_eq!(log.sections.len(), 1);
        assert_eq!(
            log.sections[0].lines,
            vec!["no timestamp here", "another line"]
        );
    }

    #[test]
    fn empty_log_produces_no_sections() {
        assert!(parse_job_log("").sections.is_empty());
    }

    #[test]
    fn section_lookup_matches_run_prefixed_group_titles() {
        let log = parse_job_log("##[group]Run build\nout\n##[endgroup]\n");
        assert!(log.section_for_step("build").is_some());
        assert!(log.section_for_step("deploy").is_none());
    }
}
