// SPDX-License-Identifier: GPL-3.0-or-later

//! Known tools and what is known about them.
//!
//! A [`ToolChain`] bundles the argument syntax of a compiler family (its
//! arglets and quoting dialect) with the way to ask it for its builtins.
//! The default registry lists the signatures of the supported families,
//! more specific names first.

pub mod recognition;

pub use crate::config::Family;
pub use recognition::{Detection, DetectorError, ToolDetector, ToolSignature};

use crate::arglets::{ArgumentParser, Arglet, Dialect, GCC_ARGLETS, MSVC_ARGLETS, NVCC_ARGLETS, ResponseFiles};
use crate::builtins::{BuiltinsDetectionBehavior, ClangBuiltins, GccBuiltins, NvccBuiltins};
use crate::config::Tool;
use std::sync::Arc;

/// The parsing configuration of one compiler family.
#[derive(Debug)]
pub struct ToolChain {
    family: Family,
    arglets: &'static [Arglet],
    dialect: Dialect,
    builtins: Option<Box<dyn BuiltinsDetectionBehavior>>,
}

impl ToolChain {
    pub fn for_family(family: Family) -> Self {
        let (arglets, dialect) = match family {
            Family::Gcc | Family::Clang | Family::Intel => (GCC_ARGLETS.as_slice(), Dialect::Posix),
            Family::Nvcc => (NVCC_ARGLETS.as_slice(), Dialect::Posix),
            Family::Msvc => (MSVC_ARGLETS.as_slice(), Dialect::Windows),
        };
        let builtins: Option<Box<dyn BuiltinsDetectionBehavior>> = match family {
            Family::Gcc | Family::Intel => Some(Box::new(GccBuiltins)),
            Family::Clang => Some(Box::new(ClangBuiltins)),
            Family::Nvcc => Some(Box::new(NvccBuiltins)),
            Family::Msvc => None,
        };
        Self { family, arglets, dialect, builtins }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// How to ask the compiler for its builtins, when it can be asked.
    pub fn builtins(&self) -> Option<&dyn BuiltinsDetectionBehavior> {
        self.builtins.as_deref()
    }

    /// A parser for the arguments of this tool.
    pub fn parser<'a>(&'a self, responses: &'a ResponseFiles) -> ArgumentParser<'a> {
        ArgumentParser::new(self.arglets, self.dialect, responses)
    }
}

/// The built-in signatures, first match wins.
pub fn default_signatures() -> Vec<ToolSignature> {
    let nvcc = Arc::new(ToolChain::for_family(Family::Nvcc));
    let clang = Arc::new(ToolChain::for_family(Family::Clang));
    let gcc = Arc::new(ToolChain::for_family(Family::Gcc));
    let intel = Arc::new(ToolChain::for_family(Family::Intel));
    let msvc = Arc::new(ToolChain::for_family(Family::Msvc));

    vec![
        ToolSignature::new("nvcc", true, nvcc),
        ToolSignature::new(r"(?:[^/\\]*-)?clang(?:\+\+)?", true, clang),
        ToolSignature::new(r"(?:[^/\\]*-)?(?:gcc|g\+\+|cc|c\+\+)", true, gcc),
        ToolSignature::new("icp?[cx]", true, intel),
        ToolSignature::new("(?:clang-)?(?i:cl)", true, msvc),
    ]
}

/// User signatures first, then the built-in ones.
pub fn signatures_with(user: &[Tool]) -> Vec<ToolSignature> {
    let mut signatures: Vec<ToolSignature> = user
        .iter()
        .map(|tool| ToolSignature::new(&tool.name, tool.match_extension, Arc::new(ToolChain::for_family(tool.as_))))
        .collect();
    signatures.extend(default_signatures());
    signatures
}
