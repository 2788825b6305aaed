//! **bugctx** - Bug context resolution for LLM-driven program repair
//!
//! Turns `(file, line range)` bug reports into the enclosing Java scope, its
//! preceding comment, and one hop of call-graph context from an external
//! code-property-graph engine.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core engine - scope resolution, comment association, call-graph client, assembly
pub mod core {
    /// Bug locations and `FILE:RANGES` parsing
    pub mod target;
    pub use target::{BugReport, BugTarget, LineRange, TargetError};

    /// Java parsing service and parsed files
    pub mod source;
    pub use source::{SourceError, SourceFile, SourceParser};

    /// Line range → enclosing method, constructor or class
    pub mod scope;
    pub use scope::{ScopeKind, ScopeNode, ScopeResolver};

    /// Comment directly preceding a scope
    pub mod comment;
    pub use comment::{CommentAssociator, CommentBlock, CommentKind};

    /// External graph-query engine client and transcript scraping
    pub mod callgraph;
    pub use callgraph::{CallGraphClient, CallGraphError, CallSite, CallerSite};

    /// Per-bug record assembly (`bugctx context`)
    pub mod context;
    pub use context::{CallGraphContext, ContextAssembler, ContextRecord, run as context_run};

    /// Text and JSON report rendering
    pub mod report;
    pub use report::{render_json, render_report};

    /// `scope`, `callers`, `callees` and `graph` commands
    pub mod inspect;
}

/// Infrastructure - configuration and line indexing
pub mod infra {
    /// Layered configuration (defaults, file, environment)
    pub mod config;
    pub use config::{Config, ReportStyle, init as config_init, load_config};

    /// CRLF/LF-robust line indexing for O(1) line→byte mapping
    pub mod line_index;
    pub use line_index::NewlineIndex;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use core::context_run;
pub use infra::{Config, load_config};

// Core types for external consumers
pub use core::{
    BugReport, CallGraphClient, CallGraphContext, ContextAssembler, ContextRecord, LineRange, ScopeNode,
    SourceParser,
};
