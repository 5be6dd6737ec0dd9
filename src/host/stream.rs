use crate::event::AppEvent;
use crate::schedule::Scheduler;
use std::time::Duration;
use tracing::debug;

pub const DEMO_REPLY: &str = "Checking in on the team.\n\n```TaskManager\n{\"followers\": 12, \"stress\": 40, \"affection\": 65, \"mentalDarkness\": 10}\n```\n\nThat is where things stand.";

pub const DEMO_SWIPE: &str = "A quieter day.\n\n```TaskManager\n{\"followers\": 13, \"stress\": 25}\n```";

pub struct ScriptedStreamer {
    scheduler: Scheduler,
    chunk_chars: usize,
    interval: Duration,
    next_stream: u64,
}

impl ScriptedStreamer {
    pub fn new(scheduler: Scheduler, chunk_chars: usize, interval: Duration) -> Self {
        Self {
            scheduler,
            chunk_chars: chunk_chars.max(1),
            interval,
            next_stream: 0,
        }
    }

    pub fn stream(&mut self, text: &str) -> u64 {
        self.next_stream += 1;
        let stream = self.next_stream;
        let chunks = chunks(text, self.chunk_chars);
        let interval = self.interval;
        let tx = self.scheduler.sender();
        debug!(stream, chunks = chunks.len(), "streaming scripted reply");

        self.scheduler.runtime_handle().spawn(async move {
            for text in chunks {
                tokio::time::sleep(interval).await;
                if tx.send(AppEvent::StreamDelta { stream, text }).is_err() {
                    return;
                }
            }
            let _ = tx.send(AppEvent::StreamEnd { stream });
        });
        stream
    }
}

fn chunks(text: &str, size: usize) -> Vec<String> {
    let characters: Vec<char> = text.chars().collect();
    characters
        .chunks(size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
