// SPDX-License-Identifier: LGPL-3.0-or-later

//! Atomic multi-port link/unlink transactions.

use std::sync::Arc;

use crate::error::Error;
use crate::object::{Object, ObjectState};
use crate::port::{InputPort, OutputPort, Port, PortLink};

/// A single `(output, input)` pair to link or unlink.
pub type PortPair = (Arc<OutputPort>, Arc<InputPort>);

/// Link every pair in `pairs`, or none of them.
///
/// Pauses every distinct running parent object (in ascending [`ObjectId`]
/// order, to avoid deadlocking against a concurrent batch), performs the
/// pairwise links, and resumes every node it paused — rolling back
/// completed links and still resuming paused nodes if any pair fails.
pub fn link_ports(pairs: &[PortPair]) -> Result<Vec<Arc<PortLink>>, Error> {
    let paused = pause_parents(pairs, Direction::Link)?;

    let mut created = Vec::with_capacity(pairs.len());
    let result: Result<(), Error> = (|| {
        for (output, input) in pairs {
            created.push(link_one(output, input)?);
        }
        Ok(())
    })();

    if let Err(error) = result {
        for link in created.iter().rev() {
            unlink_established(link);
        }
        resume_all(&paused);
        return Err(error);
    }

    resume_all(&paused);
    Ok(created)
}

/// Unlink every pair in `pairs`, or none of them. Safe against a
/// parent already in a terminal state: the pause step is skipped for
/// those, but the link is still removed.
pub fn unlink_ports(pairs: &[PortPair]) -> Result<(), Error> {
    let paused = pause_parents(pairs, Direction::Unlink)?;

    let mut removed = Vec::with_capacity(pairs.len());
    let result: Result<(), Error> = (|| {
        for (output, input) in pairs {
            let link = find_link(output, input)?;
            unlink_established(&link);
            removed.push(link);
        }
        Ok(())
    })();

    if let Err(error) = result {
        for link in removed.iter().rev() {
            if let (Some(output), Some(input)) = (link.from(), link.to()) {
                let _ = link_one(&output, &input);
            }
        }
        resume_all(&paused);
        return Err(error);
    }

    resume_all(&paused);
    Ok(())
}

/// Unlink a single already-established link, with full pause/resume
/// semantics on its (possibly still-live) endpoints. Used by
/// [`crate::object::Object`]'s destruction-with-live-links teardown path
pub(crate) fn unlink_one(link: &Arc<PortLink>) {
    if let (Some(output), Some(input)) = (link.from(), link.to()) {
        let _ = unlink_ports(&[(output, input)]);
    }
}

enum Direction {
    Link,
    Unlink,
}

struct PausedParent {
    object: Arc<Object>,
}

fn pause_parents(pairs: &[PortPair], direction: Direction) -> Result<Vec<PausedParent>, Error> {
    let mut parents: Vec<Arc<Object>> = Vec::new();
    for (output, input) in pairs {
        if let Some(parent) = output.parent() {
            if !parents.iter().any(|p| p.id() == parent.id()) {
                parents.push(parent);
            }
        }
        if let Some(parent) = input.parent() {
            if !parents.iter().any(|p| p.id() == parent.id()) {
                parents.push(parent);
            }
        }
    }
    parents.sort_by_key(|object| object.id());

    let mut paused = Vec::with_capacity(parents.len());
    for object in parents {
        let state = object.state();
        if state.is_terminal() {
            match direction {
                Direction::Unlink => continue,
                Direction::Link => {
                    resume_all(&paused);
                    return Err(Error::state(object.id(), state, vec![ObjectState::Paused, ObjectState::Waiting]));
                }
            }
        }

        if state.is_running() {
            if let Err(error) = object.pause() {
                resume_all(&paused);
                return Err(error);
            }
            paused.push(PausedParent { object });
        }
    }

    Ok(paused)
}

fn resume_all(paused: &[PausedParent]) {
    for entry in paused {
        let _ = entry.object.resume();
    }
}

fn link_one(output: &Arc<OutputPort>, input: &Arc<InputPort>) -> Result<Arc<PortLink>, Error> {
    let duplicate = output.links().iter().any(|link| link.to().is_some_and(|existing| Arc::ptr_eq(&existing, input)));
    if duplicate {
        return Err(Error::DuplicateLink { output: output.name().to_string(), input: input.name().to_string() });
    }

    let link = Arc::new(output.port_type().make_link(output, input)?);
    output.add_link(Arc::clone(&link));
    input.add_link(Arc::clone(&link));
    Ok(link)
}

fn find_link(output: &Arc<OutputPort>, input: &Arc<InputPort>) -> Result<Arc<PortLink>, Error> {
    output
        .links()
        .into_iter()
        .find(|link| link.to().is_some_and(|existing| Arc::ptr_eq(&existing, input)))
        .ok_or_else(|| Error::key_not_found(format!("{}->{}", output.name(), input.name())))
}

fn unlink_established(link: &Arc<PortLink>) {
    if let Some(output) = link.from() {
        output.remove_link(link);
    }
    if let Some(input) = link.to() {
        input.remove_link(link);
    }
}

#[cfg(test)]
#[path = "link_tests.rs"]
mod tests;
