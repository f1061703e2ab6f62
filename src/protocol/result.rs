use log::{debug, warn};

use crate::{Error, Result, block::Block};

use super::{Profile, Progress, Request, Response, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Streaming,
    Done,
    /// Cancel was sent; the rest of the stream still has to be drained.
    Cancelled,
    Poisoned,
}

/// Streamed result of one query.
///
/// The first Data response is the header, which carries the schema and no
/// rows. Iterating yields the data blocks that follow until EndOfStream.
/// Once an error has been returned, every further pull returns
/// [`Error::StreamPoisoned`].
pub struct QueryResult<'s> {
    session: &'s mut Session,
    header: Block,
    pending: Option<Block>,
    totals: Option<Block>,
    extremes: Option<Block>,
    progress: Progress,
    profile: Option<Profile>,
    state: State,
}

impl<'s> QueryResult<'s> {
    pub(crate) fn new(session: &'s mut Session) -> Result<Self> {
        let mut result = Self {
            session,
            header: Block::empty(),
            pending: None,
            totals: None,
            extremes: None,
            progress: Progress::default(),
            profile: None,
            state: State::Streaming,
        };
        match result.next_data(true) {
            Ok(Some(block)) if block.is_empty() => result.header = block,
            Ok(Some(block)) => {
                result.header = block.to_header();
                result.pending = Some(block);
            }
            Ok(None) => result.state = State::Done,
            Err(e) => return Err(result.fail(e)),
        }
        Ok(result)
    }

    pub fn header(&self) -> &Block {
        &self.header
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.header.columns().iter().map(|c| c.name()).collect()
    }

    /// Progress accumulated over the packets received so far.
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Totals block, available once the stream is exhausted.
    pub fn totals(&self) -> Option<&Block> {
        self.totals.as_ref()
    }

    pub fn extremes(&self) -> Option<&Block> {
        self.extremes.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Done
    }

    /// Next Data block, or `None` at EndOfStream. Empty blocks are skipped
    /// unless `keep_empty` is set.
    fn next_data(&mut self, keep_empty: bool) -> Result<Option<Block>> {
        loop {
            if self.session.check_interrupted().is_err() {
                self.session.send(&Request::Cancel)?;
                return Err(Error::Interrupted);
            }
            match self.session.receive_for_query()? {
                Response::Data { block, .. } if keep_empty || !block.is_empty() => {
                    return Ok(Some(block));
                }
                Response::Data { .. } => {}
                Response::Totals(block) => self.totals = Some(block),
                Response::Extremes(block) => self.extremes = Some(block),
                Response::Progress(p) => self.progress.accumulate(&p),
                Response::ProfileInfo(p) => self.profile = Some(p),
                Response::EndOfStream => return Ok(None),
                Response::Exception(e) => return Err(e.into()),
                other => debug!("skipping {other} in query result"),
            }
        }
    }

    fn fail(&mut self, error: Error) -> Error {
        self.state = match error {
            Error::Interrupted => State::Cancelled,
            _ => State::Poisoned,
        };
        if !matches!(error, Error::Interrupted) && error.is_fatal() {
            self.session.silent_disconnect();
        }
        error
    }

    /// Reads and drops whatever the server still sends for this query.
    fn drain(&mut self) -> Result<()> {
        loop {
            match self.session.receive_for_query()? {
                Response::EndOfStream => return Ok(()),
                Response::Exception(e) => {
                    debug!("query ended with {}", Error::from(e));
                    return Ok(());
                }
                other => debug!("draining {other}"),
            }
        }
    }
}

impl Iterator for QueryResult<'_> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Done => return None,
            State::Cancelled | State::Poisoned => return Some(Err(Error::StreamPoisoned)),
            State::Streaming => {}
        }
        if let Some(block) = self.pending.take() {
            return Some(Ok(block));
        }
        match self.next_data(false) {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => {
                self.state = State::Done;
                None
            }
            Err(e) => Some(Err(self.fail(e))),
        }
    }
}

impl Drop for QueryResult<'_> {
    fn drop(&mut self) {
        let outcome = match self.state {
            State::Streaming => self
                .session
                .send(&Request::Cancel)
                .and_then(|_| self.drain()),
            State::Cancelled => self.drain(),
            State::Done | State::Poisoned => return,
        };
        if let Err(e) = outcome {
            warn!("abandoning unfinished query result: {e}");
            self.session.silent_disconnect();
        }
    }
}
