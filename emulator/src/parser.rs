//! Job-control deck parsing.
//!
//! A deck is a sequence of jobs, each bracketed by control cards:
//!
//! ```text
//! $AMJ jjjj tttt llll     (job id, time limit, line limit; no separators)
//! ...program cards...
//! $DTA
//! ...data cards...
//! $END jjjj
//! ```
//!
//! Parsing is line oriented; only the control cards need real grammar, and
//! those go through `nom` so malformed cards fail cleanly instead of being
//! swallowed as program text.

use miette::{Diagnostic, SourceSpan};
use nom::branch::alt;
use nom::bytes::complete::{tag, take, take_while_m_n};
use nom::combinator::{all_consuming, map_res, opt, value};
use nom::sequence::{preceded, tuple};
use nom::IResult;
use thiserror::Error;

/// A parsed job: its identity, quotas, and card sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub time_limit: usize,
    pub line_limit: usize,
    pub program: Vec<String>,
    pub data: Vec<String>,
}

/// A whole input deck, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Deck {
    pub jobs: Vec<Job>,
}

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum DeckError {
    #[error("malformed control card on line {line}")]
    #[diagnostic(code(deck::malformed_card))]
    MalformedCard {
        line: usize,
        #[label("not a valid control card")]
        span: SourceSpan,
    },

    #[error("unexpected {card} card on line {line}")]
    #[diagnostic(
        code(deck::unexpected_card),
        help("control cards must follow the $AMJ, $DTA, $END sequence")
    )]
    UnexpectedCard {
        card: String,
        line: usize,
        #[label("out of sequence")]
        span: SourceSpan,
    },

    #[error("card outside of any job on line {line}")]
    #[diagnostic(
        code(deck::card_outside_job),
        help("program and data cards must appear between $AMJ and $END")
    )]
    CardOutsideJob {
        line: usize,
        #[label("no job is open here")]
        span: SourceSpan,
    },

    #[error("job {expected} was ended by a $END card for job {found} on line {line}")]
    #[diagnostic(code(deck::job_mismatch))]
    JobMismatch {
        expected: String,
        found: String,
        line: usize,
        #[label("does not match the open job")]
        span: SourceSpan,
    },

    #[error("job {id} is missing its $END card")]
    #[diagnostic(code(deck::unterminated_job))]
    UnterminatedJob { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ControlCard<'a> {
    JobStart {
        id: &'a str,
        time_limit: usize,
        line_limit: usize,
    },
    DataStart,
    JobEnd {
        id: Option<&'a str>,
    },
}

fn parse_limit(input: &str) -> IResult<&str, usize> {
    map_res(
        take_while_m_n(4, 4, |c: char| c.is_ascii_digit()),
        str::parse,
    )(input)
}

fn parse_job_start(input: &str) -> IResult<&str, ControlCard> {
    let (input, (id, time_limit, line_limit)) = preceded(
        tag("$AMJ"),
        tuple((take(4usize), parse_limit, parse_limit)),
    )(input)?;
    Ok((
        input,
        ControlCard::JobStart {
            id,
            time_limit,
            line_limit,
        },
    ))
}

fn parse_job_end(input: &str) -> IResult<&str, ControlCard> {
    let (input, id) = preceded(tag("$END"), opt(take(4usize)))(input)?;
    Ok((input, ControlCard::JobEnd { id }))
}

fn parse_control_card(input: &str) -> IResult<&str, ControlCard> {
    all_consuming(alt((
        parse_job_start,
        value(ControlCard::DataStart, tag("$DTA")),
        parse_job_end,
    )))(input)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Program,
    Data,
}

impl Deck {
    /// Parse a whole deck.
    ///
    /// # Errors
    ///
    /// Control cards out of sequence, malformed cards, stray cards outside
    /// a job, and unterminated jobs are all rejected, with the offending
    /// line annotated.
    pub fn parse(source: &str) -> Result<Deck, DeckError> {
        let mut jobs = Vec::new();
        let mut current: Option<Job> = None;
        let mut section = Section::Program;
        let mut offset = 0;

        for (number, raw) in source.lines().enumerate() {
            let line = number + 1;
            let span = SourceSpan::from((offset, raw.len()));
            offset += raw.len() + 1;
            let card = raw.trim_end();

            if card.starts_with('$') {
                let (_, control) = parse_control_card(card)
                    .map_err(|_| DeckError::MalformedCard { line, span })?;
                match control {
                    ControlCard::JobStart {
                        id,
                        time_limit,
                        line_limit,
                    } => {
                        if current.is_some() {
                            return Err(DeckError::UnexpectedCard {
                                card: "$AMJ".to_string(),
                                line,
                                span,
                            });
                        }
                        current = Some(Job {
                            id: id.to_string(),
                            time_limit,
                            line_limit,
                            program: Vec::new(),
                            data: Vec::new(),
                        });
                        section = Section::Program;
                    }

                    ControlCard::DataStart => {
                        if current.is_none() || section == Section::Data {
                            return Err(DeckError::UnexpectedCard {
                                card: "$DTA".to_string(),
                                line,
                                span,
                            });
                        }
                        section = Section::Data;
                    }

                    ControlCard::JobEnd { id } => {
                        let Some(job) = current.take() else {
                            return Err(DeckError::UnexpectedCard {
                                card: "$END".to_string(),
                                line,
                                span,
                            });
                        };
                        if let Some(found) = id {
                            if found != job.id {
                                return Err(DeckError::JobMismatch {
                                    expected: job.id,
                                    found: found.to_string(),
                                    line,
                                    span,
                                });
                            }
                        }
                        jobs.push(job);
                    }
                }
            } else if !card.is_empty() {
                match &mut current {
                    Some(job) if section == Section::Program => {
                        job.program.push(card.to_string());
                    }
                    Some(job) => job.data.push(card.to_string()),
                    None => return Err(DeckError::CardOutsideJob { line, span }),
                }
            }
        }

        if let Some(job) = current {
            return Err(DeckError::UnterminatedJob { id: job.id });
        }
        Ok(Deck { jobs })
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "$AMJ {}  time limit {}, line limit {}",
            self.id, self.time_limit, self.line_limit
        )?;
        for card in &self.program {
            writeln!(f, "    {card}")?;
        }
        writeln!(f, "$DTA")?;
        for card in &self.data {
            writeln!(f, "    {card}")?;
        }
        writeln!(f, "$END {}", self.id)
    }
}

impl std::fmt::Display for Deck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for job in &self.jobs {
            writeln!(f, "{job}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_a_two_job_deck() {
        let source = indoc! {"
            $AMJ000100100005
            GD10PD10H
            $DTA
            HELLO WORLD
            $END0001

            $AMJ000200020001
            H
            $DTA
            $END0002
        "};

        let deck = Deck::parse(source).unwrap();
        assert_eq!(
            deck,
            Deck {
                jobs: vec![
                    Job {
                        id: "0001".to_string(),
                        time_limit: 10,
                        line_limit: 5,
                        program: vec!["GD10PD10H".to_string()],
                        data: vec!["HELLO WORLD".to_string()],
                    },
                    Job {
                        id: "0002".to_string(),
                        time_limit: 2,
                        line_limit: 1,
                        program: vec!["H".to_string()],
                        data: vec![],
                    },
                ],
            }
        );
    }

    #[test]
    fn end_card_may_omit_the_job_id() {
        let source = indoc! {"
            $AMJ000100100005
            H
            $DTA
            $END
        "};
        let deck = Deck::parse(source).unwrap();
        assert_eq!(deck.jobs.len(), 1);
    }

    #[test]
    fn rejects_malformed_control_cards() {
        let source = "$AMJ0001\n";
        assert!(matches!(
            Deck::parse(source),
            Err(DeckError::MalformedCard { line: 1, .. })
        ));
    }

    #[test]
    fn rejects_data_start_outside_a_job() {
        let source = "$DTA\n";
        assert!(matches!(
            Deck::parse(source),
            Err(DeckError::UnexpectedCard { line: 1, .. })
        ));
    }

    #[test]
    fn rejects_cards_before_the_first_job() {
        let source = "GD10\n$AMJ000100100005\n$DTA\n$END\n";
        assert!(matches!(
            Deck::parse(source),
            Err(DeckError::CardOutsideJob { line: 1, .. })
        ));
    }

    #[test]
    fn rejects_mismatched_end_cards() {
        let source = indoc! {"
            $AMJ000100100005
            H
            $DTA
            $END0009
        "};
        let error = Deck::parse(source).unwrap_err();
        assert_eq!(
            error,
            DeckError::JobMismatch {
                expected: "0001".to_string(),
                found: "0009".to_string(),
                line: 4,
                span: SourceSpan::from((24, 8)),
            }
        );
    }

    #[test]
    fn rejects_unterminated_jobs() {
        let source = indoc! {"
            $AMJ000100100005
            H
        "};
        assert!(matches!(
            Deck::parse(source),
            Err(DeckError::UnterminatedJob { id }) if id == "0001"
        ));
    }

    #[test]
    fn rejects_nested_job_starts() {
        let source = indoc! {"
            $AMJ000100100005
            $AMJ000200100005
        "};
        assert!(matches!(
            Deck::parse(source),
            Err(DeckError::UnexpectedCard { line: 2, .. })
        ));
    }
}
