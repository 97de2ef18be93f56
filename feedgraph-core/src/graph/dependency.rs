//! Dependency Index
//!
//! Tracks which computations depend on which names, in both directions.
//!
//! # Algorithm
//!
//! Propagation walks the reverse edges breadth-first:
//!
//! 1. Start from the changed name
//! 2. Emit an edge for every dependent of the current name
//! 3. Queue each dependent the first time it is reached
//! 4. Repeat until the queue is empty
//!
//! Every dependent is queued at most once, so the walk terminates even if
//! the graph contains a cycle. The store rejects cycles at registration by
//! default; `find_cycle` is the check it uses.
//!
//! Batches of dirty computations are ordered with Kahn's algorithm so that
//! dependencies are evaluated before their dependents.

use std::collections::{HashMap, HashSet, VecDeque};

use smallvec::SmallVec;

type Names = SmallVec<[String; 4]>;

/// One step of a propagation walk: `dependent` must be told that `input`
/// changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge<'a> {
    pub dependent: &'a str,
    pub input: &'a str,
}

/// Forward and reverse dependency edges between computation names.
///
/// Names referenced as dependencies do not need to be registered yet.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// name -> names it reads from.
    dependencies: HashMap<String, Names>,

    /// name -> names that read from it.
    dependents: HashMap<String, Names>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `name` depends on each of `dependencies`.
    pub fn insert(&mut self, name: &str, dependencies: &[String]) {
        for dependency in dependencies {
            let dependents = self.dependents.entry(dependency.clone()).or_default();
            if !dependents.iter().any(|d| d == name) {
                dependents.push(name.to_owned());
            }
        }
        self.dependencies
            .entry(name.to_owned())
            .or_default()
            .extend(dependencies.iter().cloned());
    }

    pub fn dependencies(&self, name: &str) -> &[String] {
        self.dependencies.get(name).map(|d| d.as_slice()).unwrap_or(&[])
    }

    pub fn dependents(&self, name: &str) -> &[String] {
        self.dependents.get(name).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// Check whether adding `name -> dependencies` would close a cycle.
    ///
    /// Returns the cycle as a path that starts and ends with `name`.
    pub fn find_cycle(&self, name: &str, dependencies: &[String]) -> Option<Vec<String>> {
        let mut parent: HashMap<&str, &str> = HashMap::new();
        let mut stack: Vec<&str> = Vec::new();

        for dependency in dependencies {
            if dependency == name {
                return Some(vec![name.to_owned(), name.to_owned()]);
            }
            if !parent.contains_key(dependency.as_str()) {
                parent.insert(dependency, name);
                stack.push(dependency);
            }
        }

        while let Some(current) = stack.pop() {
            for next in self.dependencies(current) {
                if next == name {
                    // Walk back from `current` to the dependency we started at.
                    let mut chain = vec![current];
                    let mut cursor = current;
                    while let Some(&up) = parent.get(cursor) {
                        if up == name {
                            break;
                        }
                        chain.push(up);
                        cursor = up;
                    }

                    let mut path = Vec::with_capacity(chain.len() + 2);
                    path.push(name.to_owned());
                    path.extend(chain.into_iter().rev().map(str::to_owned));
                    path.push(name.to_owned());
                    return Some(path);
                }
                if !parent.contains_key(next.as_str()) {
                    parent.insert(next, current);
                    stack.push(next);
                }
            }
        }

        None
    }

    /// Every edge reachable from `changed`, in breadth-first order.
    pub fn cascade<'a>(&'a self, changed: &'a str) -> Vec<Edge<'a>> {
        let mut edges = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        visited.insert(changed);
        queue.push_back(changed);

        while let Some(input) = queue.pop_front() {
            for dependent in self.dependents(input) {
                let dependent = dependent.as_str();
                edges.push(Edge { dependent, input });
                if visited.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }

        edges
    }

    /// Order `names` so that dependencies come before their dependents.
    ///
    /// Only edges between members of `names` are considered. Ties keep the
    /// input order, and members of a cycle are appended at the end in input
    /// order.
    pub fn topological_order(&self, names: &[String]) -> Vec<String> {
        let members: HashSet<&str> = names.iter().map(String::as_str).collect();
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut queue = VecDeque::new();
        let mut result = Vec::with_capacity(names.len());

        for name in names {
            if in_degree.contains_key(name.as_str()) {
                continue;
            }
            let degree = self
                .dependencies(name)
                .iter()
                .filter(|d| members.contains(d.as_str()))
                .count();
            in_degree.insert(name, degree);
            if degree == 0 {
                queue.push_back(name.as_str());
            }
        }

        // Kahn's algorithm
        while let Some(name) = queue.pop_front() {
            result.push(name.to_owned());

            for dependent in self.dependents(name) {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    if *degree == 0 {
                        continue;
                    }
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent.as_str());
                    }
                }
            }
        }

        if result.len() < in_degree.len() {
            let placed: HashSet<String> = result.iter().cloned().collect();
            let mut seen = HashSet::new();
            for name in names {
                if !placed.contains(name) && seen.insert(name.as_str()) {
                    result.push(name.clone());
                }
            }
        }

        result
    }
}
