// SPDX-License-Identifier: PMPL-1.0-or-later

//! pci-assess: PCI DSS assessment orchestration over a cloud CLI.
//!
//! The engine has three parts, wired together by [`assess`]:
//! 1. **Scope**: resolves one project or an organization into a cached
//!    list of targets and fans CLI commands out across them.
//! 2. **Gate**: probes the permissions a requirement needs and decides
//!    whether the run may proceed, proceed degraded, or abort.
//! 3. **Report**: streams a nested, collapsible HTML report and closes it
//!    with a compliance summary. [`report::consolidate`] rolls several
//!    requirement reports into one overview.

pub mod assess;
pub mod cloud;
pub mod error;
pub mod gate;
pub mod plan;
pub mod profile;
pub mod report;
pub mod scope;
pub mod types;
