//! Workload corpus: ordered query/fixture pairs with selection policies.
//!
//! A corpus is immutable once built and read-only during a run, so workers
//! share it without locking. Each worker owns its own [`Selector`], which
//! carries the round-robin cursor and the seeded randomness source: two
//! runs with the same seed reproduce the same selection sequence.
//!
//! Registration is explicit: workloads are declared through
//! [`WorkloadCorpus::builder`] (or loaded from a JSON file), never
//! discovered dynamically.

use qstorm_error::{HarnessError, Result};
use qstorm_types::{SelectionPlan, SelectionPolicy, WorkGroup, WorkloadItem};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

/// Half-open range of a group's items inside the flattened item list.
#[derive(Debug, Clone)]
struct GroupSpan {
    name: String,
    start: usize,
    len: usize,
}

/// Immutable, ordered collection of workload items, optionally
/// partitioned into named groups.
#[derive(Debug, Clone)]
pub struct WorkloadCorpus {
    items: Vec<WorkloadItem>,
    groups: Vec<GroupSpan>,
}

impl WorkloadCorpus {
    /// Start registering groups and items.
    #[must_use]
    pub fn builder() -> WorkloadCorpusBuilder {
        WorkloadCorpusBuilder { groups: Vec::new() }
    }

    /// A flat corpus: one anonymous group holding `items` in order.
    pub fn from_items(items: Vec<WorkloadItem>) -> Result<Self> {
        Self::from_groups(vec![WorkGroup {
            name: "default".to_owned(),
            items,
        }])
    }

    /// Build from named groups. Group order and item order are preserved.
    ///
    /// Fails with [`HarnessError::EmptyCorpus`] when no group holds any
    /// item, and with [`HarnessError::InvalidConfig`] on an empty group
    /// or a duplicated group name, either of which would make grouped selection
    /// meaningless.
    pub fn from_groups(groups: Vec<WorkGroup>) -> Result<Self> {
        if groups.iter().all(|group| group.items.is_empty()) {
            return Err(HarnessError::EmptyCorpus);
        }

        let mut items = Vec::new();
        let mut spans: Vec<GroupSpan> = Vec::with_capacity(groups.len());
        for group in groups {
            if group.items.is_empty() {
                return Err(HarnessError::InvalidConfig(format!(
                    "work group '{}' has no items",
                    group.name
                )));
            }
            if spans.iter().any(|span| span.name == group.name) {
                return Err(HarnessError::InvalidConfig(format!(
                    "duplicate work group name '{}'",
                    group.name
                )));
            }
            let start = items.len();
            let len = group.items.len();
            items.extend(group.items);
            spans.push(GroupSpan {
                name: group.name,
                start,
                len,
            });
        }

        Ok(Self {
            items,
            groups: spans,
        })
    }

    /// Parse the CLI workload file format: either a top-level array of
    /// items or an object with a `groups` array.
    pub fn from_json(text: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WorkloadFile {
            Groups { groups: Vec<WorkGroup> },
            Items(Vec<WorkloadItem>),
        }

        let parsed: WorkloadFile = serde_json::from_str(text)
            .map_err(|err| HarnessError::WorkloadParse(err.to_string()))?;
        match parsed {
            WorkloadFile::Groups { groups } => Self::from_groups(groups),
            WorkloadFile::Items(items) => Self::from_items(items),
        }
    }

    /// Total item count across all groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false for a constructed corpus; kept for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of registered groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Registered group names, in registration order.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|span| span.name.as_str())
    }

    /// The item at a global index.
    #[must_use]
    pub fn item(&self, index: usize) -> Option<&WorkloadItem> {
        self.items.get(index)
    }

    /// All items in global order.
    #[must_use]
    pub fn items(&self) -> &[WorkloadItem] {
        &self.items
    }

    /// A fresh selector over this corpus.
    ///
    /// Every worker builds its own: cursors and RNG state are per-caller,
    /// the corpus itself stays shared and read-only.
    #[must_use]
    pub fn selector(&self, plan: SelectionPlan, seed: u64) -> Selector {
        Selector {
            plan,
            rng: StdRng::seed_from_u64(seed),
            cursor: 0,
            group_cursor: 0,
            current_group: None,
            item_cursor: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Registers named work groups and their items, in declaration order.
#[derive(Debug, Default)]
pub struct WorkloadCorpusBuilder {
    groups: Vec<WorkGroup>,
}

impl WorkloadCorpusBuilder {
    /// Open a new named group; subsequent items land in it.
    #[must_use]
    pub fn group(mut self, name: impl Into<String>) -> Self {
        self.groups.push(WorkGroup {
            name: name.into(),
            items: Vec::new(),
        });
        self
    }

    /// Register a validated item in the current group.
    #[must_use]
    pub fn item(self, query_text: impl Into<String>, expected: impl Into<String>) -> Self {
        self.push(WorkloadItem::checked(query_text, expected))
    }

    /// Register a load-only item (executed, never compared).
    #[must_use]
    pub fn load_item(self, query_text: impl Into<String>) -> Self {
        self.push(WorkloadItem::load_only(query_text))
    }

    /// Register a prebuilt item in the current group, opening an
    /// anonymous group when none was declared.
    #[must_use]
    pub fn push(mut self, item: WorkloadItem) -> Self {
        if self.groups.is_empty() {
            self.groups.push(WorkGroup {
                name: "default".to_owned(),
                items: Vec::new(),
            });
        }
        if let Some(group) = self.groups.last_mut() {
            group.items.push(item);
        }
        self
    }

    /// Finish registration.
    pub fn build(self) -> Result<WorkloadCorpus> {
        if self.groups.is_empty() {
            return Err(HarnessError::EmptyCorpus);
        }
        WorkloadCorpus::from_groups(self.groups)
    }
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// Per-worker selection state: round-robin cursors plus a seeded RNG.
///
/// Flat SEQUENTIAL selection is `items[counter % size]`: over `size`
/// consecutive calls every item is chosen exactly once, in original
/// order. Flat RANDOM draws uniformly with replacement. Grouped
/// selection picks a group first, then an item within it; a sequential
/// item policy exhausts the whole group before the group choice
/// advances.
#[derive(Debug)]
pub struct Selector {
    plan: SelectionPlan,
    rng: StdRng,
    cursor: usize,
    group_cursor: usize,
    current_group: Option<usize>,
    item_cursor: usize,
}

impl Selector {
    /// Choose the next item; returns its global index and the item.
    pub fn next<'c>(&mut self, corpus: &'c WorkloadCorpus) -> (usize, &'c WorkloadItem) {
        let index = match self.plan {
            SelectionPlan::Flat(SelectionPolicy::Sequential) => {
                let index = self.cursor % corpus.len();
                self.cursor = self.cursor.wrapping_add(1);
                index
            }
            SelectionPlan::Flat(SelectionPolicy::Random) => self.rng.gen_range(0..corpus.len()),
            SelectionPlan::Grouped {
                groups,
                items: SelectionPolicy::Sequential,
            } => {
                let group = match self.current_group {
                    Some(group) => group,
                    None => {
                        let group = self.pick_group(groups, corpus);
                        self.current_group = Some(group);
                        self.item_cursor = 0;
                        group
                    }
                };
                let span = &corpus.groups[group];
                let index = span.start + self.item_cursor;
                self.item_cursor += 1;
                if self.item_cursor == span.len {
                    self.current_group = None;
                }
                index
            }
            SelectionPlan::Grouped {
                groups,
                items: SelectionPolicy::Random,
            } => {
                let group = self.pick_group(groups, corpus);
                let span = &corpus.groups[group];
                span.start + self.rng.gen_range(0..span.len)
            }
        };
        (index, &corpus.items[index])
    }

    fn pick_group(&mut self, policy: SelectionPolicy, corpus: &WorkloadCorpus) -> usize {
        match policy {
            SelectionPolicy::Sequential => {
                let group = self.group_cursor % corpus.group_count();
                self.group_cursor = self.group_cursor.wrapping_add(1);
                group
            }
            SelectionPolicy::Random => self.rng.gen_range(0..corpus.group_count()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
