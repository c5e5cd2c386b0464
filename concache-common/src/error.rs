//  Copyright 2026 The concache Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

use thiserror::Error;

/// Errors returned by cache construction and resizing.
///
/// Accounting inconsistencies (a non-monotonic `size_of`) are programmer
/// errors and panic instead of surfacing here; see the crate-level docs.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum ConfigError {
    #[error("max_size must be greater than zero")]
    NonPositiveMaxSize,
}
