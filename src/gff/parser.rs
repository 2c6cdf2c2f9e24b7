//! Line-at-a-time GFF state machine that builds a feature context.

use log::{debug, warn};

use crate::config::{ClipMode, ParserConfig};
use crate::error::{ParseError, ParseErrorKind};
use crate::model::{AlignBlock, Context, Feature, FeatureData, HomolType, Span, Style, normalize_id};
use crate::strand::{Phase, Strand};
use crate::term::{FeatureKind, TermClassifier};

use super::attribute::{Attributes, parse_attributes};
use super::columns::{RawColumns, split_columns};
use super::gap::{CigarFormat, check_cigar_lengths, cigar_to_blocks, parse_cigar, parse_v2_gaps};
use super::header::{Directive, SequenceRegion, parse_directive};
use super::state::{ParseState, ParserState, SequenceTarget};
use super::{GffVersion, ParseOutcome, ParseStatus};

/// Attributes that map onto typed feature fields and are not kept as extras.
const TYPED_KEYS: &[&str] = &[
    "ID",
    "Name",
    "Parent",
    "Derives_from",
    "Note",
    "URL",
    "url",
    "Locus",
    "locus",
    "variation",
    "ensembl_variation",
    "evidence",
    "Target",
    "Gap",
    "cigar_exonerate",
    "cigar_ensembl",
    "cigar_bam",
    "Gaps",
    "Align",
    "Class",
    "percentID",
    "Percent_ID",
    "pid",
    "Length",
    "Clone",
    "sequence",
    "start_not_found",
    "end_not_found",
];

/// `Target` decoded from either dialect.
#[derive(Debug, Clone)]
struct AlignTarget {
    id: String,
    span: Option<Span>,
    strand: Strand,
    /// v2 class prefix, as in `Sequence:AF1234`.
    class: Option<String>,
}

/// A validated body line, ready to merge.
struct BodyLine<'a> {
    source: &'a str,
    ontology: &'a str,
    kind: FeatureKind,
    version: GffVersion,
    span: Span,
    /// Span after the clip policy.
    extent: Span,
    score: Option<f64>,
    strand: Strand,
    phase: Phase,
    attrs: Attributes,
    /// Grouping keys. Several only for a component with more than one parent.
    keys: Vec<String>,
    /// exon, intron or CDS line of a transcript.
    component: bool,
    /// Keyed by its `Parent` rather than its own id.
    by_parent: bool,
    target: Option<AlignTarget>,
    blocks: Vec<AlignBlock>,
    homol_type: HomolType,
    percent_id: Option<f64>,
    length: Option<i32>,
    start_not_found: Option<u8>,
    end_not_found: bool,
}

/// Streaming GFF parser. Feed it lines, then call [`Parser::finish`].
///
/// A parser and its state belong to one thread at a time; hand-off between phases goes
/// through [`Parser::into_state`] and [`Parser::resume`].
pub struct Parser {
    classifier: TermClassifier,
    state: ParserState,
}

impl Parser {
    pub fn new(config: ParserConfig) -> Self {
        Self::resume(ParserState::new(config))
    }

    /// Continue from a saved state.
    pub fn resume(state: ParserState) -> Self {
        Self {
            classifier: TermClassifier::new(),
            state,
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: TermClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn state(&self) -> &ParserState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> ParserState {
        self.state
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.state.context
    }

    /// True once the parser has reached a terminal state and ignores further lines.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.state.is_terminal()
    }

    /// Consume one header line. Returns `true` once the header is complete; the first body
    /// line is then held and replayed by the next [`Parser::parse_line`].
    pub fn parse_header_line(&mut self, line: &str) -> Result<bool, ParseError> {
        if !matches!(
            self.state.state,
            ParseState::None | ParseState::HeaderIncomplete
        ) {
            return Ok(true);
        }
        self.state.line_number += 1;
        let number = self.state.line_number;
        let result = match self.state.state {
            ParseState::None => self.version_line(line).map(|()| false),
            _ => self.header_line(line),
        };
        match result {
            Ok(true) => {
                self.end_header();
                self.state.state = ParseState::HeaderComplete;
                self.state.pending_line = Some(line.to_string());
                Ok(true)
            }
            Ok(false) => Ok(self.state.state == ParseState::Sequence),
            Err(e) => Err(self.record(e.at(number, line))),
        }
    }

    /// Consume one line. Failures are also recorded in the state; with `stop_on_error`
    /// (or for header failures) the parser moves to the error state.
    pub fn parse_line(&mut self, line: &str) -> Result<(), ParseError> {
        if self.is_stopped() {
            return Ok(());
        }
        if self.state.state == ParseState::HeaderComplete {
            self.state.state = ParseState::Body;
            if let Some(pending) = self.state.pending_line.take() {
                let number = self.state.line_number;
                // a failure here is already recorded; the new line still gets its turn
                let _ = self.dispatch(&pending, number);
                if self.is_stopped() {
                    return Ok(());
                }
            }
        }
        self.state.line_number += 1;
        let number = self.state.line_number;
        self.dispatch(line, number)
    }

    /// End of input: report what the stream produced.
    pub fn finish(self) -> (Context, ParseOutcome) {
        self.conclude(false)
    }

    pub(crate) fn conclude(mut self, cancelled: bool) -> (Context, ParseOutcome) {
        if !cancelled
            && self.state.state == ParseState::HeaderComplete
            && let Some(pending) = self.state.pending_line.take()
        {
            self.state.state = ParseState::Body;
            let number = self.state.line_number;
            let _ = self.dispatch(&pending, number);
        }
        if self.state.sequence_target.is_some() {
            self.check_dna_length();
        }

        let mut status = match self.state.state {
            ParseState::Error => ParseStatus::Failed,
            ParseState::None | ParseState::HeaderIncomplete | ParseState::HeaderComplete => {
                ParseStatus::Incomplete
            }
            _ => ParseStatus::Done,
        };
        let awaiting = self.state.awaiting_count();
        if status == ParseStatus::Done && awaiting > 0 {
            let error = ParseError::new(
                ParseErrorKind::IncompleteFeature,
                format!("{awaiting} multi-line features never saw their head line"),
            )
            .at(self.state.line_number, "");
            self.state.errors.push(error);
            status = ParseStatus::Incomplete;
        }
        if cancelled {
            status = ParseStatus::Cancelled;
        }

        let loaded = matches!(status, ParseStatus::Done | ParseStatus::Incomplete)
            && !matches!(
                self.state.state,
                ParseState::None | ParseState::HeaderIncomplete
            );
        if loaded && !self.state.config.parse_only && !self.state.context.sequence_name.is_empty() {
            let span = self.state.context.window.unwrap_or_else(Span::unbounded);
            self.state.context.master_block_mut().mark_loaded(span);
        }
        if self.state.state != ParseState::Error {
            self.state.state = ParseState::Done;
        }

        let state = self.state;
        let outcome = ParseOutcome {
            status,
            features_added: state.features_added,
            error: state.errors.first().cloned(),
            errors: state.errors,
            counters: state.counters,
            last_line: state.line_number,
        };
        (state.context, outcome)
    }

    fn dispatch(&mut self, line: &str, number: usize) -> Result<(), ParseError> {
        self.step(line)
            .map_err(|e| self.record(e.at(number, line)))
    }

    fn record(&mut self, error: ParseError) -> ParseError {
        if self.state.config.stop_on_error || error.kind == ParseErrorKind::BadHeader {
            warn!("parse stopped: {error}");
            self.state.state = ParseState::Error;
        } else {
            debug!("skipping line: {error}");
        }
        self.state.errors.push(error.clone());
        error
    }

    fn step(&mut self, line: &str) -> Result<(), ParseError> {
        match self.state.state {
            ParseState::None => self.version_line(line),
            ParseState::HeaderIncomplete => {
                if self.header_line(line)? {
                    self.end_header();
                    self.state.state = ParseState::Body;
                    self.body_line(line)?;
                }
                Ok(())
            }
            ParseState::HeaderComplete | ParseState::Body => {
                self.state.state = ParseState::Body;
                self.body_line(line)
            }
            ParseState::Sequence => self.sequence_line(line),
            ParseState::Error | ParseState::Done => Ok(()),
        }
    }

    fn version_line(&mut self, line: &str) -> Result<(), ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        if line.starts_with('#') && !line.starts_with("##") {
            self.state.counters.comment += 1;
            return Ok(());
        }
        if line.starts_with("##")
            && let Directive::Version(version) = parse_directive(line)?
        {
            self.state.version = Some(version);
            self.state.counters.header += 1;
            self.state.state = ParseState::HeaderIncomplete;
            return Ok(());
        }
        Err(ParseError::new(
            ParseErrorKind::BadHeader,
            "stream does not start with a ##gff-version directive",
        ))
    }

    /// Returns `true` when the line is the first body line and was not consumed.
    fn header_line(&mut self, line: &str) -> Result<bool, ParseError> {
        let line = line.trim_end();
        if line.trim_start().is_empty() {
            return Ok(false);
        }
        if line.starts_with("##") {
            self.directive(line)?;
            return Ok(false);
        }
        if line.starts_with('#') {
            self.state.counters.comment += 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn end_header(&self) {
        if !self.state.region_seen {
            warn!(
                "no ##sequence-region in header of {} stream",
                self.state.context.sequence_name
            );
        }
    }

    fn directive(&mut self, line: &str) -> Result<(), ParseError> {
        let directive = parse_directive(line)?;
        match directive {
            Directive::Fasta => {
                self.state.counters.fasta_directive += 1;
                self.state.in_dna_block = false;
                self.state.sequence_target = Some(SequenceTarget::Unnamed);
                self.state.state = ParseState::Sequence;
            }
            Directive::Dna(name) => {
                self.state.counters.fasta_directive += 1;
                let target = match name {
                    Some(name) => self.sequence_target_for(&name),
                    None => SequenceTarget::Master,
                };
                self.start_record(target);
                self.state.in_dna_block = true;
                self.state.state = ParseState::Sequence;
            }
            Directive::EndDna => {
                self.state.counters.header += 1;
                debug!("##end-DNA outside a DNA block");
            }
            Directive::Closure => {
                self.state.counters.header += 1;
                self.state.multiline.clear();
                self.state.awaiting_head.clear();
            }
            Directive::Version(version) => {
                self.state.counters.header += 1;
                if self.state.version != Some(version) {
                    warn!("ignoring ##gff-version {version} after the stream started");
                }
            }
            Directive::SequenceRegion(region) => {
                self.state.counters.header += 1;
                self.sequence_region(region)?;
            }
            other => {
                self.state.counters.header += 1;
                if let Directive::Other { name, .. } = &other {
                    debug!("recording directive ##{name}");
                }
                self.state.header.record(&other);
            }
        }
        Ok(())
    }

    fn sequence_region(&mut self, region: SequenceRegion) -> Result<(), ParseError> {
        let context = &mut self.state.context;
        if context.sequence_name.is_empty() {
            context.set_sequence(&region.name);
        } else if !context.sequence_name.eq_ignore_ascii_case(&region.name) {
            debug!("ignoring ##sequence-region for {}", region.name);
            return Ok(());
        }

        match self.state.config.window() {
            Some(window) if !window.overlaps(region.span) => {
                return Err(ParseError::new(
                    ParseErrorKind::BadHeader,
                    format!(
                        "##sequence-region {} {} does not overlap requested range {window}",
                        region.name, region.span
                    ),
                ));
            }
            Some(_) => {}
            None => {
                if context.window.is_none() && context.alignments.is_empty() {
                    context.window = Some(region.span);
                }
            }
        }

        self.state.region_seen = true;
        if self.state.header.sequence_region.is_none() {
            self.state.header.sequence_region = Some(region);
        }
        Ok(())
    }

    /// Whether a body line's sequence is the one being loaded. The first name seen is adopted
    /// when none was configured.
    fn accept_sequence(&mut self, name: &str) -> bool {
        let context = &mut self.state.context;
        if context.sequence_name.is_empty() {
            context.set_sequence(name);
            return true;
        }
        if context.sequence_name.eq_ignore_ascii_case(name) {
            return true;
        }
        if self.state.warned_sequences.insert(name.to_string()) {
            debug!(
                "skipping lines for sequence {name} while loading {}",
                context.sequence_name
            );
        }
        false
    }

    fn body_line(&mut self, line: &str) -> Result<(), ParseError> {
        if line.trim().is_empty() {
            return Ok(());
        }
        if line.starts_with("##") {
            return self.directive(line.trim_end());
        }
        if line.starts_with('#') {
            self.state.counters.comment += 1;
            return Ok(());
        }
        if line.starts_with('>') {
            self.state.in_dna_block = false;
            self.state.state = ParseState::Sequence;
            return self.sequence_line(line);
        }

        self.state.counters.body += 1;
        let raw = split_columns(line)?;
        if !self.accept_sequence(raw.sequence) {
            return Ok(());
        }
        let kind = self.classify(&raw)?;
        let mut body = self.read_body_line(&raw, kind)?;
        let set_id = normalize_id(body.source);

        if self.drop_excluded(&set_id, &mut body) {
            self.state.counters.clipped += 1;
            return Ok(());
        }
        if !self.apply_clip(&mut body) {
            self.state.counters.clipped += 1;
            self.exclude_outside(&set_id, &body);
            return Ok(());
        }

        if self.state.config.parse_only {
            self.count_only(&set_id, &body);
            return Ok(());
        }
        if body.keys.is_empty() {
            self.merge_line(&set_id, &body, None);
        } else {
            for key in &body.keys {
                self.merge_line(&set_id, &body, Some(key.as_str()));
            }
        }
        Ok(())
    }

    fn classify(&self, raw: &RawColumns<'_>) -> Result<FeatureKind, ParseError> {
        let config = &self.state.config;
        let kind = self
            .classifier
            .classify(raw.ontology, config.so_compliant, config.default_to_basic)
            .ok_or_else(|| {
                ParseError::new(
                    ParseErrorKind::UnknownType,
                    format!("unrecognised feature type '{}'", raw.ontology),
                )
            })?;
        let mode = self
            .state
            .context
            .style_for_source(raw.source)
            .and_then(|style| style.mode);
        Ok(mode.unwrap_or(kind))
    }

    fn read_body_line<'a>(
        &self,
        raw: &RawColumns<'a>,
        kind: FeatureKind,
    ) -> Result<BodyLine<'a>, ParseError> {
        let columns = raw.parse()?;
        let version = self.state.version.unwrap_or(GffVersion::V3);
        let attrs = parse_attributes(raw.attributes, version)?;
        let component = kind == FeatureKind::Transcript && is_component(raw.ontology);
        let (keys, by_parent) = grouping_keys(version, kind, component, &attrs);

        let start_not_found = attrs
            .get("start_not_found")
            .map(parse_start_not_found)
            .transpose()?;
        let end_not_found = attrs
            .get("end_not_found")
            .is_some_and(|v| !matches!(v, "false" | "0"));

        let (target, blocks, homol_type, percent_id, length) = if kind == FeatureKind::Alignment {
            let target = alignment_target(&attrs, version)?;
            let homol_type = homol_type(version, raw.ontology, &attrs, target.as_ref());
            let blocks = line_blocks(
                version,
                &attrs,
                columns.span,
                columns.strand,
                target.as_ref(),
                homol_type,
            )?;
            let percent_id = attrs
                .get_any(&["percentID", "Percent_ID", "pid"])
                .map(|v| parse_number::<f64>("percent id", v))
                .transpose()?;
            let length = attrs
                .get("Length")
                .map(|v| parse_number::<i32>("Length", v))
                .transpose()?;
            (target, blocks, homol_type, percent_id, length)
        } else {
            (None, Vec::new(), HomolType::None, None, None)
        };

        Ok(BodyLine {
            source: raw.source,
            ontology: raw.ontology,
            kind,
            version,
            span: columns.span,
            extent: columns.span,
            score: columns.score,
            strand: columns.strand,
            phase: columns.phase,
            attrs,
            keys,
            component,
            by_parent,
            target,
            blocks,
            homol_type,
            percent_id,
            length,
            start_not_found,
            end_not_found,
        })
    }

    /// Drop lines whose feature, or whose parent, was already excluded by clipping.
    fn drop_excluded(&mut self, set_id: &str, body: &mut BodyLine<'_>) -> bool {
        let Some(excluded) = self.state.excluded.get_mut(set_id) else {
            return false;
        };
        if body.by_parent {
            let before = body.keys.len();
            body.keys.retain(|k| !excluded.contains(k));
            return before > 0 && body.keys.is_empty();
        }
        let parent_excluded = body
            .attrs
            .get_all("Parent")
            .flat_map(|p| p.split(','))
            .any(|p| excluded.contains(p.trim()));
        if parent_excluded || body.keys.iter().any(|k| excluded.contains(k)) {
            // children of this line go with it
            excluded.extend(body.keys.iter().cloned());
            return true;
        }
        false
    }

    /// Apply the clip policy. Returns `false` when the line falls outside the window.
    fn apply_clip(&self, body: &mut BodyLine<'_>) -> bool {
        let Some(window) = self.state.config.window() else {
            return true;
        };
        match self.state.config.clip_mode {
            ClipMode::None => true,
            ClipMode::All => window.contains(body.span),
            ClipMode::Overlap => {
                let Some(extent) = body.span.clamp_to(window) else {
                    return false;
                };
                body.extent = extent;
                if !body.blocks.is_empty() {
                    let target_strand = body.target.as_ref().map_or(Strand::None, |t| t.strand);
                    let strand = body.strand;
                    body.blocks = body
                        .blocks
                        .iter()
                        .filter_map(|b| clip_block(*b, window, strand, target_strand))
                        .collect();
                    if let Some(first) = body.blocks.first() {
                        body.extent = body
                            .blocks
                            .iter()
                            .fold(first.query, |acc, b| acc.union(b.query));
                    }
                }
                true
            }
        }
    }

    fn exclude_outside(&mut self, set_id: &str, body: &BodyLine<'_>) {
        match self.state.config.clip_mode {
            ClipMode::All => {
                for key in &body.keys {
                    self.state
                        .excluded
                        .entry(set_id.to_string())
                        .or_default()
                        .insert(key.clone());
                    let uid = self
                        .state
                        .multiline
                        .get_mut(set_id)
                        .and_then(|index| index.remove(key));
                    if let Some(awaiting) = self.state.awaiting_head.get_mut(set_id) {
                        awaiting.remove(key);
                    }
                    let Some(uid) = uid else { continue };
                    let removed = self
                        .state
                        .context
                        .master_block_mut()
                        .feature_set_mut(set_id)
                        .and_then(|set| set.remove_feature(&uid));
                    if removed.is_some() {
                        self.state.features_added = self.state.features_added.saturating_sub(1);
                        debug!("dropped {uid}: not contained in the requested range");
                    }
                }
            }
            ClipMode::Overlap if body.kind == FeatureKind::Transcript && !body.component => {
                let index = self.state.multiline.get(set_id);
                let new_keys: Vec<String> = body
                    .keys
                    .iter()
                    .filter(|k| !index.is_some_and(|i| i.contains_key(*k)))
                    .cloned()
                    .collect();
                self.state
                    .excluded
                    .entry(set_id.to_string())
                    .or_default()
                    .extend(new_keys);
            }
            _ => {}
        }
    }

    fn count_only(&mut self, set_id: &str, body: &BodyLine<'_>) {
        if body.keys.is_empty() {
            self.state.features_added += 1;
            return;
        }
        let index = self.state.multiline.entry(set_id.to_string()).or_default();
        for key in &body.keys {
            if index.insert(key.clone(), String::new()).is_none() {
                self.state.features_added += 1;
            }
        }
    }

    /// Fold one line into the feature for `key`, creating the feature on first sight.
    fn merge_line(&mut self, set_id: &str, body: &BodyLine<'_>, key: Option<&str>) {
        let indexed = key.and_then(|k| self.state.multiline.get(set_id)?.get(k).cloned());
        let head_arrives = !body.by_parent
            && key.is_some_and(|k| {
                self.state
                    .awaiting_head
                    .get(set_id)
                    .is_some_and(|awaiting| awaiting.contains(k))
            });
        let style_id = self
            .state
            .context
            .style_for_source(body.source)
            .map(Style::id);

        let set = self
            .state
            .context
            .master_block_mut()
            .feature_set_or_insert(body.source);
        if set.style_id.is_none() {
            set.style_id.clone_from(&style_id);
        }

        let uid = match indexed {
            Some(uid) if set.features.contains_key(&uid) => uid,
            _ => {
                let feature = build_feature(body, key, style_id);
                let uid = feature.unique_id.clone();
                if set.add_feature(feature) {
                    self.state.features_added += 1;
                    if let Some(key) = key {
                        self.state
                            .multiline
                            .entry(set_id.to_string())
                            .or_default()
                            .insert(key.to_string(), uid);
                        if body.by_parent {
                            self.state
                                .awaiting_head
                                .entry(set_id.to_string())
                                .or_default()
                                .insert(key.to_string());
                        }
                    }
                    return;
                }
                uid
            }
        };

        let Some(feature) = set.feature_mut(&uid) else {
            return;
        };
        if feature.kind() != body.kind {
            warn!(
                "{} line for {} conflicts with existing {} feature, spans dropped",
                body.ontology,
                key.unwrap_or(uid.as_str()),
                feature.kind()
            );
            self.state.counters.type_conflicts += 1;
            return;
        }
        if head_arrives {
            adopt_head(feature, body, key);
        }
        add_spans(feature, body);
        let uid = set.rekey(&uid).unwrap_or(uid);

        if let Some(key) = key {
            self.state
                .multiline
                .entry(set_id.to_string())
                .or_default()
                .insert(key.to_string(), uid);
            if !body.by_parent
                && let Some(awaiting) = self.state.awaiting_head.get_mut(set_id)
            {
                awaiting.remove(key);
            }
        }
    }

    fn sequence_target_for(&mut self, name: &str) -> SequenceTarget {
        let context = &mut self.state.context;
        if context.sequence_name.is_empty() {
            context.set_sequence(name);
        }
        if context.sequence_name.eq_ignore_ascii_case(name) {
            SequenceTarget::Master
        } else {
            SequenceTarget::Other(name.to_string())
        }
    }

    /// Switch sequence output to a new record, starting it empty.
    fn start_record(&mut self, target: SequenceTarget) {
        if self.state.sequence_target.is_some() {
            self.check_dna_length();
        }
        match &target {
            SequenceTarget::Master => {
                self.state.context.master_block_mut().dna = Some(String::new());
            }
            SequenceTarget::Other(name) => {
                self.state
                    .context
                    .master_block_mut()
                    .other_sequences
                    .insert(name.clone(), String::new());
            }
            SequenceTarget::Unnamed => {}
        }
        self.state.sequence_target = Some(target);
    }

    fn sequence_line(&mut self, line: &str) -> Result<(), ParseError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        if self.state.in_dna_block {
            if trimmed.starts_with("##end-DNA") {
                self.state.counters.header += 1;
                self.check_dna_length();
                self.state.in_dna_block = false;
                self.state.sequence_target = None;
                self.state.state = ParseState::Body;
                return Ok(());
            }
            let Some(bases) = trimmed.strip_prefix("##") else {
                return Err(ParseError::new(
                    ParseErrorKind::BadSequence,
                    "expected a ## sequence line inside a ##DNA block",
                ));
            };
            self.state.counters.sequence += 1;
            return self.append_sequence(bases);
        }

        if let Some(header) = trimmed.strip_prefix('>') {
            self.state.counters.sequence += 1;
            let name = header.split_whitespace().next().unwrap_or_default();
            let target = self.sequence_target_for(name);
            self.start_record(target);
            return Ok(());
        }
        if trimmed.starts_with('#') {
            self.state.counters.comment += 1;
            return Ok(());
        }
        if line.matches('\t').count() >= 8 {
            // features after a bare FASTA record
            self.state.sequence_target = None;
            self.state.state = ParseState::Body;
            return self.body_line(line);
        }
        self.state.counters.sequence += 1;
        self.append_sequence(trimmed)
    }

    fn append_sequence(&mut self, text: &str) -> Result<(), ParseError> {
        let bases: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if let Some(bad) = bases
            .chars()
            .find(|c| !(c.is_ascii_alphabetic() || matches!(c, '*' | '-')))
        {
            return Err(ParseError::new(
                ParseErrorKind::BadSequence,
                format!("invalid sequence character '{bad}'"),
            ));
        }
        match &self.state.sequence_target {
            Some(SequenceTarget::Master) => {
                self.state
                    .context
                    .master_block_mut()
                    .dna
                    .get_or_insert_with(String::new)
                    .push_str(&bases);
                Ok(())
            }
            Some(SequenceTarget::Other(name)) => {
                self.state
                    .context
                    .master_block_mut()
                    .other_sequences
                    .entry(name.clone())
                    .or_default()
                    .push_str(&bases);
                Ok(())
            }
            Some(SequenceTarget::Unnamed) | None => Err(ParseError::new(
                ParseErrorKind::BadSequence,
                "sequence line before any '>' record header",
            )),
        }
    }

    fn check_dna_length(&self) {
        if self.state.sequence_target != Some(SequenceTarget::Master) {
            return;
        }
        let Some(window) = self.state.context.window else {
            return;
        };
        if let Some(dna) = self.state.context.dna()
            && i64::try_from(dna.len()).is_ok_and(|len| len != window.len())
        {
            warn!(
                "DNA for {} has {} bases, range {window} needs {}",
                self.state.context.sequence_name,
                dna.len(),
                window.len()
            );
        }
    }
}

pub(crate) fn is_component(term: &str) -> bool {
    let term = term.to_ascii_lowercase();
    term.contains("exon") || term.contains("intron") || term.contains("cds")
}

/// Keys that tie the lines of one feature together, and whether they came from `Parent`.
fn grouping_keys(
    version: GffVersion,
    kind: FeatureKind,
    component: bool,
    attrs: &Attributes,
) -> (Vec<String>, bool) {
    if version == GffVersion::V3
        && component
        && let Some(parents) = attrs.get("Parent")
    {
        let keys: Vec<String> = parents
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        return (keys, true);
    }
    let id = match version {
        GffVersion::V3 => attrs.get("ID"),
        GffVersion::V2 => attrs.get("ID").or_else(|| {
            if kind == FeatureKind::Transcript {
                attrs.get_any(&["Sequence", "Transcript"])
            } else {
                None
            }
        }),
    };
    (id.into_iter().map(str::to_string).collect(), false)
}

fn parse_number<T: std::str::FromStr>(label: &str, value: &str) -> Result<T, ParseError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        ParseError::new(
            ParseErrorKind::MalformedAttribute,
            format!("invalid {label} '{value}': {e}"),
        )
    })
}

fn parse_start_not_found(value: &str) -> Result<u8, ParseError> {
    match value.trim() {
        "1" => Ok(1),
        "2" => Ok(2),
        "3" => Ok(3),
        other => Err(ParseError::new(
            ParseErrorKind::MalformedAttribute,
            format!("start_not_found must be 1, 2 or 3, got '{other}'"),
        )),
    }
}

/// Parse `id [start end [strand]]`. The id may itself contain spaces.
fn parse_target(value: &str) -> Result<AlignTarget, ParseError> {
    let mut tokens: Vec<&str> = value.split_whitespace().collect();
    let mut strand = Strand::None;
    if tokens.len() > 1
        && let Some(last) = tokens.last()
        && matches!(*last, "+" | "-" | ".")
    {
        strand = Strand::from_gff(last)?;
        tokens.pop();
    }

    let mut span = None;
    if tokens.len() >= 3 {
        let n = tokens.len();
        if let (Ok(start), Ok(end)) = (tokens[n - 2].parse::<i32>(), tokens[n - 1].parse::<i32>()) {
            if start < 1 || end < 1 {
                return Err(ParseError::new(
                    ParseErrorKind::MalformedAttribute,
                    format!("Target coordinates must be positive: '{value}'"),
                ));
            }
            span = Some(Span::new(start, end));
            tokens.truncate(n - 2);
        }
    }
    if tokens.is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::MalformedAttribute,
            format!("Target without a sequence id: '{value}'"),
        ));
    }
    Ok(AlignTarget {
        id: tokens.join(" "),
        span,
        strand,
        class: None,
    })
}

fn alignment_target(
    attrs: &Attributes,
    version: GffVersion,
) -> Result<Option<AlignTarget>, ParseError> {
    let Some(value) = attrs.get("Target") else {
        return Ok(None);
    };
    let mut target = parse_target(value)?;
    if version == GffVersion::V2 {
        if let Some((prefix, id)) = target.id.split_once(':')
            && HomolType::from_class(prefix) != HomolType::None
        {
            target.class = Some(prefix.to_string());
            target.id = id.to_string();
        }
        if target.span.is_none()
            && let Some(align) = attrs.get("Align")
        {
            let aligned = parse_target(&format!("align {align}"))?;
            target.span = aligned.span;
            if target.strand == Strand::None {
                target.strand = aligned.strand;
            }
        }
    }
    Ok(Some(target))
}

fn homol_type(
    version: GffVersion,
    ontology: &str,
    attrs: &Attributes,
    target: Option<&AlignTarget>,
) -> HomolType {
    match version {
        GffVersion::V3 => {
            if ontology.eq_ignore_ascii_case("protein_match")
                || ontology.eq_ignore_ascii_case("translated_nucleotide_match")
            {
                HomolType::Protein
            } else {
                HomolType::Dna
            }
        }
        GffVersion::V2 => attrs
            .get("Class")
            .or_else(|| target.and_then(|t| t.class.as_deref()))
            .map_or(HomolType::None, HomolType::from_class),
    }
}

/// Aligned blocks described by one line, before clipping.
///
/// Protein matches are not length-checked: their alignment strings may count either
/// residues or bases.
fn line_blocks(
    version: GffVersion,
    attrs: &Attributes,
    span: Span,
    strand: Strand,
    target: Option<&AlignTarget>,
    homol_type: HomolType,
) -> Result<Vec<AlignBlock>, ParseError> {
    if version == GffVersion::V2
        && let Some(gaps) = attrs.get("Gaps")
    {
        return parse_v2_gaps(gaps);
    }
    let Some(target) = target else {
        return Ok(Vec::new());
    };
    let cigar = CigarFormat::ALL
        .into_iter()
        .filter(|f| version == GffVersion::V3 || *f != CigarFormat::Gap)
        .find_map(|f| attrs.get(f.attribute()).map(|value| (f, value)));
    if let Some((format, value)) = cigar {
        let Some(target_span) = target.span else {
            return Err(ParseError::new(
                ParseErrorKind::MalformedAttribute,
                format!("{format} given without Target coordinates"),
            ));
        };
        let ops = parse_cigar(format, value)?;
        if homol_type != HomolType::Protein {
            check_cigar_lengths(format, &ops, span, target_span)?;
        }
        return Ok(cigar_to_blocks(&ops, span, strand, target_span, target.strand));
    }
    Ok(target
        .span
        .map(|t| AlignBlock {
            query: span,
            target: t,
        })
        .into_iter()
        .collect())
}

/// Trim a block to the window, moving the target ends by the same amounts.
fn clip_block(
    block: AlignBlock,
    window: Span,
    strand: Strand,
    target_strand: Strand,
) -> Option<AlignBlock> {
    let query = block.query.clamp_to(window)?;
    let left = query.start - block.query.start;
    let right = block.query.end - query.end;
    if left == 0 && right == 0 {
        return Some(block);
    }
    let t = block.target;
    let target = if block.query.len() != t.len() {
        t
    } else if strand.is_reverse() == target_strand.is_reverse() {
        Span::new(t.start + left, t.end - right)
    } else {
        Span::new(t.start + right, t.end - left)
    };
    Some(AlignBlock { query, target })
}

fn display_name(body: &BodyLine<'_>, key: Option<&str>) -> String {
    if body.by_parent
        && let Some(key) = key
    {
        return key.to_string();
    }
    body.attrs
        .get("Name")
        .map(str::to_string)
        .or_else(|| body.target.as_ref().map(|t| t.id.clone()))
        .or_else(|| key.map(str::to_string))
        .unwrap_or_else(|| body.ontology.to_string())
}

fn is_typed_key(key: &str, body: &BodyLine<'_>) -> bool {
    TYPED_KEYS.contains(&key)
        || (body.version == GffVersion::V2
            && body.kind == FeatureKind::Transcript
            && matches!(key, "Sequence" | "Transcript"))
}

/// New feature from the first line that names it.
fn build_feature(body: &BodyLine<'_>, key: Option<&str>, style_id: Option<String>) -> Feature {
    let mut feature = Feature::new(
        display_name(body, key),
        body.ontology,
        body.kind,
        body.extent,
        body.strand,
    );
    feature.source = body.source.to_string();
    feature.style_id = style_id;
    feature.phase = body.phase;
    feature.score = body.score;
    feature.gff_id = key.map(str::to_string);

    // a component filed under its parent carries none of its own attributes
    if !body.by_parent {
        let attrs = &body.attrs;
        let owned = |v: &str| v.to_string();
        feature.name = attrs.get("Name").map(owned);
        feature.parent = attrs.get("Parent").map(owned);
        feature.derives_from = attrs.get("Derives_from").map(owned);
        feature.notes = attrs.get_all("Note").map(owned).collect();
        feature.url = attrs.get_any(&["URL", "url"]).map(owned);
        feature.locus = attrs.get_any(&["Locus", "locus"]).map(owned);
        feature.variation = attrs
            .get_any(&["variation", "ensembl_variation"])
            .map(owned)
            .or_else(|| {
                let name = feature.name.as_deref()?;
                name.split_once(" - ").map(|(_, allele)| allele.trim().to_string())
            });
        feature.evidence = attrs
            .get("evidence")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(owned)
                    .collect()
            })
            .unwrap_or_default();
        feature.extra_attributes = attrs
            .iter()
            .filter(|(k, _)| !is_typed_key(k, body))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
    }

    if let FeatureData::Alignment(homology) = &mut feature.data {
        if let Some(target) = &body.target {
            homology.target_id = Some(target.id.clone());
            homology.target_strand = target.strand;
        }
        homology.homol_type = body.homol_type;
        homology.percent_id = body.percent_id;
        homology.length = body.length;
        homology.clone_id = body.attrs.get("Clone").map(str::to_string);
        homology.sequence = body.attrs.get("sequence").map(str::to_string);
    }

    add_spans(&mut feature, body);
    feature.unique_id = feature.derive_unique_id();
    feature
}

/// Add a line's spans to a feature of the same kind.
/// Take the head line's own columns and attributes for a feature first built from its
/// components.
fn adopt_head(feature: &mut Feature, body: &BodyLine<'_>, key: Option<&str>) {
    let head = build_feature(body, key, feature.style_id.clone());
    feature.original_id = head.original_id;
    feature.ontology = head.ontology;
    feature.score = head.score;
    feature.phase = head.phase;
    feature.name = head.name;
    feature.parent = head.parent;
    feature.derives_from = head.derives_from;
    feature.notes = head.notes;
    feature.url = head.url;
    feature.locus = head.locus;
    feature.variation = head.variation;
    feature.evidence = head.evidence;
    feature.extra_attributes = head.extra_attributes;
}

fn add_spans(feature: &mut Feature, body: &BodyLine<'_>) {
    feature.extend(body.extent);
    match &mut feature.data {
        FeatureData::Basic => {}
        FeatureData::Transcript(transcript) => {
            let term = body.ontology.to_ascii_lowercase();
            if term.contains("cds") {
                transcript.add_cds(body.extent, body.phase);
            } else if term.contains("exon") {
                transcript.add_exon(body.extent);
            }
            if body.start_not_found.is_some() {
                transcript.start_not_found = body.start_not_found;
            }
            if body.end_not_found {
                transcript.end_not_found = true;
            }
        }
        FeatureData::Alignment(homology) => {
            for block in &body.blocks {
                homology.add_block(*block);
            }
            if homology.target_id.is_none()
                && let Some(target) = &body.target
            {
                homology.target_id = Some(target.id.clone());
                homology.target_strand = target.strand;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Transcript;

    fn parse(text: &str, config: ParserConfig) -> (Context, ParseOutcome) {
        let mut parser = Parser::new(config);
        for line in text.lines() {
            let _ = parser.parse_line(line);
        }
        parser.finish()
    }

    fn only_feature(ctx: &Context) -> &Feature {
        let features: Vec<_> = ctx.features().collect();
        assert_eq!(features.len(), 1, "expected exactly one feature");
        features[0]
    }

    fn transcript(feature: &Feature) -> &Transcript {
        feature.transcript().expect("transcript payload")
    }

    #[test]
    fn single_exon_line() {
        let (ctx, outcome) = parse(
            "##gff-version 3\nchr1\t.\texon\t100\t200\t.\t+\t.\tID=exon1",
            ParserConfig::default(),
        );
        assert_eq!(outcome.status, ParseStatus::Done);
        assert_eq!(outcome.features_added, 1);
        let f = only_feature(&ctx);
        assert_eq!(f.kind(), FeatureKind::Transcript);
        assert_eq!((f.x1, f.x2), (100, 200));
        assert_eq!(f.strand, Strand::Forward);
        assert_eq!(transcript(f).exons, vec![Span::new(100, 200)]);
        assert_eq!(ctx.sequence_name, "chr1");
    }

    #[test]
    fn bad_coordinate_is_skipped() {
        let mut parser = Parser::new(ParserConfig::default());
        parser.parse_line("##gff-version 3").unwrap();
        let err = parser
            .parse_line("chr1\t.\texon\t200\t100\t.\t+\t.\tID=bad")
            .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::BadCoordinate);
        assert_eq!(err.line, 2);
        assert_eq!(parser.state().state, ParseState::Body);

        let (ctx, outcome) = parser.finish();
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.error.unwrap().kind, ParseErrorKind::BadCoordinate);
        assert_eq!(outcome.features_added, 0);
        assert_eq!(ctx.feature_count(), 0);
    }

    #[test]
    fn v2_alignment_lines_share_id() {
        let text = "##gff-version 2\n\
            chr1\test\tsimilarity\t100\t149\t90\t+\t.\tID \"aln1\" ; Target \"Sequence:EST1\" 1 50\n\
            chr1\test\tsimilarity\t160\t209\t90\t+\t.\tID \"aln1\" ; Target \"Sequence:EST1\" 51 100\n";
        let (ctx, outcome) = parse(text, ParserConfig::default());
        assert_eq!(outcome.features_added, 1);
        let f = only_feature(&ctx);
        let h = f.homology().unwrap();
        assert_eq!(h.blocks.len(), 2);
        assert_eq!(h.target_id.as_deref(), Some("EST1"));
        assert_eq!(h.target, Some(Span::new(1, 100)));
        assert_eq!(h.homol_type, HomolType::Dna);
        assert_eq!((f.x1, f.x2), (100, 209));
        assert_eq!(f.unique_id, "est1_'+'_100.209_1.100");
    }

    fn clip_config(mode: ClipMode) -> ParserConfig {
        let mut config = ParserConfig::new("chr1", 50, 75);
        config.clip_mode = mode;
        config
    }

    const LONG_REGION: &str = "##gff-version 3\nchr1\tsrc\tregion\t10\t100\t.\t+\t.\tID=r1";

    #[test]
    fn clip_none_keeps_feature() {
        let (ctx, _) = parse(LONG_REGION, clip_config(ClipMode::None));
        let f = only_feature(&ctx);
        assert_eq!((f.x1, f.x2), (10, 100));
    }

    #[test]
    fn clip_overlap_trims_feature() {
        let (ctx, _) = parse(LONG_REGION, clip_config(ClipMode::Overlap));
        let f = only_feature(&ctx);
        assert_eq!((f.x1, f.x2), (50, 75));
    }

    #[test]
    fn clip_all_drops_feature() {
        let (ctx, outcome) = parse(LONG_REGION, clip_config(ClipMode::All));
        assert_eq!(ctx.feature_count(), 0);
        assert_eq!(outcome.counters.clipped, 1);
        assert!(outcome.errors.is_empty());
        // queried with nothing found is still recorded
        assert_eq!(ctx.master_block().unwrap().loaded, Some(Span::new(50, 75)));
    }

    #[test]
    fn spans_kept_in_file_order() {
        let text = "##gff-version 3\n\
            chr1\tsrc\texon\t300\t400\t.\t+\t.\tID=foo\n\
            chr1\tsrc\texon\t100\t200\t.\t+\t.\tID=foo\n\
            chr1\tsrc\texon\t500\t600\t.\t+\t.\tID=foo\n";
        let (ctx, _) = parse(text, ParserConfig::default());
        let f = only_feature(&ctx);
        assert_eq!(
            transcript(f).exons,
            vec![Span::new(300, 400), Span::new(100, 200), Span::new(500, 600)]
        );
        assert_eq!((f.x1, f.x2), (100, 600));
        assert_eq!(f.unique_id, "foo_'+'_100.600");
    }

    const TRANSCRIPT: &str = "\
chr1\tcurated\tmRNA\t100\t600\t.\t-\t.\tID=tx1;Name=TX1;Note=first;Note=second
chr1\tcurated\texon\t100\t200\t.\t-\t.\tParent=tx1
chr1\tcurated\texon\t500\t600\t.\t-\t.\tParent=tx1
chr1\tcurated\tCDS\t150\t200\t.\t-\t2\tParent=tx1;start_not_found=2
chr1\tcurated\tCDS\t500\t550\t.\t-\t0\tParent=tx1;end_not_found=true
chr1\tblast\tEST_match\t1000\t1022\t.\t+\t.\tID=m1;Target=EST9 1 21 +;Gap=M8 D3 M6 I1 M6;percentID=97.5
";

    #[test]
    fn transcript_assembled_from_components() {
        let (ctx, outcome) = parse(&format!("##gff-version 3\n{TRANSCRIPT}"), ParserConfig::default());
        assert_eq!(outcome.status, ParseStatus::Done);
        let tx = ctx
            .features()
            .find(|f| f.kind() == FeatureKind::Transcript)
            .unwrap();
        assert_eq!(tx.original_id, "TX1");
        assert_eq!(tx.gff_id.as_deref(), Some("tx1"));
        assert_eq!(tx.notes, ["first", "second"]);
        assert_eq!(tx.strand, Strand::Reverse);
        assert!(tx.x1 <= tx.x2);
        let t = transcript(tx);
        assert_eq!(t.exons.len(), 2);
        assert_eq!(t.introns(), vec![Span::new(201, 499)]);
        assert_eq!(t.cds, Some(Span::new(150, 550)));
        assert_eq!(t.cds_phase, Phase::Two);
        assert_eq!(t.start_not_found, Some(2));
        assert!(t.end_not_found);
    }

    #[test]
    fn gap_attribute_expands_to_blocks() {
        let (ctx, _) = parse(&format!("##gff-version 3\n{TRANSCRIPT}"), ParserConfig::default());
        let m = ctx
            .features()
            .find(|f| f.kind() == FeatureKind::Alignment)
            .unwrap();
        let h = m.homology().unwrap();
        assert_eq!(h.blocks.len(), 3);
        assert_eq!(h.blocks[1].query, Span::new(1011, 1016));
        assert_eq!(h.percent_id, Some(97.5));
        assert_eq!(m.unique_id, "est9_'+'_1000.1022_1.21");
        assert_eq!(m.feature_set_id, "blast");
    }

    #[test]
    fn gap_must_cover_both_extents() {
        let text = "##gff-version 3\n\
            chr1\tblast\tEST_match\t100\t109\t.\t+\t.\tID=m;Target=E 1 50 +;Gap=M50\n\
            chr1\tblast\tEST_match\t200\t249\t.\t+\t.\tID=ok;Target=E 1 50 +;Gap=M50\n";
        let (ctx, outcome) = parse(text, ParserConfig::default());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, ParseErrorKind::MalformedAttribute);
        assert_eq!(outcome.errors[0].line, 2);
        let f = only_feature(&ctx);
        assert_eq!(f.homology().unwrap().blocks.len(), 1);
        assert_eq!(f.x1, 200);
    }

    #[test]
    fn protein_gap_not_length_checked() {
        let text = "##gff-version 3\n\
            chr1\tpfam\tprotein_match\t100\t129\t.\t+\t.\tID=p;Target=P1 1 10 +;Gap=M10\n";
        let (ctx, outcome) = parse(text, ParserConfig::default());
        assert!(outcome.errors.is_empty());
        assert_eq!(only_feature(&ctx).homology().unwrap().blocks.len(), 1);
    }

    #[test]
    fn cigar_attributes_expand_to_blocks() {
        let expected = [Span::new(1000, 1007), Span::new(1011, 1016), Span::new(1017, 1022)];
        for cigar in [
            "cigar_exonerate=M 8 D 3 M 6 I 1 M 6",
            "cigar_ensembl=8M3I6M1D6M",
            "cigar_bam=8M3N6M1I6M",
        ] {
            let text = format!(
                "##gff-version 3\nchr1\tblast\tEST_match\t1000\t1022\t.\t+\t.\tID=m1;Target=EST9 1 21 +;{cigar}\n"
            );
            let (ctx, outcome) = parse(&text, ParserConfig::default());
            assert!(outcome.errors.is_empty(), "{cigar}: {:?}", outcome.errors);
            let f = only_feature(&ctx);
            let h = f.homology().unwrap();
            let query: Vec<Span> = h.blocks.iter().map(|b| b.query).collect();
            assert_eq!(query, expected, "{cigar}");
            assert_eq!(h.blocks[2].target, Span::new(16, 21), "{cigar}");
            assert!(f.extra_attributes.iter().all(|(k, _)| !k.starts_with("cigar_")), "{cigar}");
        }
    }

    #[test]
    fn duplicate_stream_is_idempotent() {
        let once = format!("##gff-version 3\n{TRANSCRIPT}");
        let twice = format!("##gff-version 3\n{TRANSCRIPT}{TRANSCRIPT}");
        let (a, _) = parse(&once, ParserConfig::default());
        let (b, outcome) = parse(&twice, ParserConfig::default());
        assert_eq!(a, b);
        assert_eq!(outcome.features_added, 2);
    }

    #[test]
    fn first_type_wins_on_conflict() {
        let text = "##gff-version 3\n\
            chr1\tsrc\texon\t100\t200\t.\t+\t.\tID=x\n\
            chr1\tsrc\tnucleotide_match\t300\t400\t.\t+\t.\tID=x;Target=E1 1 101\n";
        let (ctx, outcome) = parse(text, ParserConfig::default());
        let f = only_feature(&ctx);
        assert_eq!(f.kind(), FeatureKind::Transcript);
        assert_eq!(f.x2, 200);
        assert_eq!(outcome.counters.type_conflicts, 1);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn reverse_strand_keeps_coordinate_order() {
        let text = "##gff-version 3\n\
            chr1\tsrc\tprotein_match\t100\t129\t.\t-\t.\tID=p;Target=P1 1 10 +\n";
        let (ctx, _) = parse(text, ParserConfig::default());
        let f = only_feature(&ctx);
        assert!(f.x1 <= f.x2);
        assert_eq!(f.homology().unwrap().homol_type, HomolType::Protein);
    }

    #[test]
    fn region_outside_window_is_fatal() {
        let text = "##gff-version 3\n##sequence-region chr1 1 1000\nchr1\tsrc\tregion\t1\t5\t.\t+\t.\t.";
        let (ctx, outcome) = parse(text, ParserConfig::new("chr1", 5000, 6000));
        assert_eq!(outcome.status, ParseStatus::Failed);
        assert_eq!(outcome.error.unwrap().kind, ParseErrorKind::BadHeader);
        assert_eq!(ctx.feature_count(), 0);
    }

    #[test]
    fn other_sequences_skipped() {
        let text = "##gff-version 3\n\
            chr2\tsrc\tregion\t1\t5\t.\t+\t.\tID=a\n\
            chr1\tsrc\tregion\t1\t5\t.\t+\t.\tID=b\n";
        let (ctx, outcome) = parse(text, ParserConfig::new("chr1", 1, 100));
        assert!(outcome.errors.is_empty());
        assert_eq!(only_feature(&ctx).original_id, "b");
        assert_eq!(outcome.counters.body, 2);
    }

    #[test]
    fn unknown_type_policy() {
        let text = "##gff-version 3\nchr1\tsrc\tbogus_term\t1\t5\t.\t+\t.\tID=a";
        let (_, outcome) = parse(text, ParserConfig::default());
        assert_eq!(outcome.error.unwrap().kind, ParseErrorKind::UnknownType);

        let mut config = ParserConfig::default();
        config.default_to_basic = true;
        let (ctx, outcome) = parse(text, config);
        assert!(outcome.errors.is_empty());
        assert_eq!(only_feature(&ctx).kind(), FeatureKind::Basic);
    }

    #[test]
    fn legacy_term_rejected_when_so_compliant() {
        let text = "##gff-version 3\nchr1\tsrc\tsimilarity\t1\t5\t.\t+\t.\tID=a";
        let mut config = ParserConfig::default();
        config.so_compliant = true;
        let (_, outcome) = parse(text, config);
        assert_eq!(outcome.error.unwrap().kind, ParseErrorKind::UnknownType);
    }

    #[test]
    fn stop_on_error_ignores_the_rest() {
        let text = "##gff-version 3\n\
            chr1\tsrc\tregion\t1\tx\t.\t+\t.\tID=a\n\
            chr1\tsrc\tregion\t1\t5\t.\t+\t.\tID=b\n";
        let mut config = ParserConfig::default();
        config.stop_on_error = true;
        let (ctx, outcome) = parse(text, config);
        assert_eq!(outcome.status, ParseStatus::Failed);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(ctx.feature_count(), 0);
    }

    #[test]
    fn fasta_section() {
        let text = "##gff-version 3\n##sequence-region chr1 1 8\n\
            chr1\t.\tregion\t1\t8\t.\t+\t.\tID=r\n\
            ##FASTA\n>chr1 assembled\nACGT\nacgt\n>other\nTT\n";
        let (ctx, outcome) = parse(text, ParserConfig::default());
        assert!(outcome.is_ok());
        assert_eq!(ctx.dna(), Some("ACGTacgt"));
        assert_eq!(ctx.master_block().unwrap().other_sequences["other"], "TT");
        assert_eq!(outcome.counters.fasta_directive, 1);
        assert_eq!(outcome.counters.sequence, 5);
    }

    #[test]
    fn bad_sequence_character() {
        let text = "##gff-version 3\n##FASTA\n>chr1\nAC1T\n";
        let (_, outcome) = parse(text, ParserConfig::default());
        assert_eq!(outcome.error.unwrap().kind, ParseErrorKind::BadSequence);
    }

    #[test]
    fn v2_dna_block_then_features() {
        let text = "##gff-version 2\n##sequence-region chr1 1 8\n##DNA chr1\n##ACGT\n##ACGT\n##end-DNA\n\
            chr1\tcurated\tSequence\t1\t8\t.\t+\t.\tSequence \"B0250.1\"\n\
            chr1\tcurated\texon\t1\t3\t.\t+\t.\tSequence \"B0250.1\"\n\
            chr1\tcurated\texon\t6\t8\t.\t+\t.\tSequence \"B0250.1\"\n";
        let (ctx, outcome) = parse(text, ParserConfig::default());
        assert!(outcome.is_ok());
        assert_eq!(ctx.dna(), Some("ACGTACGT"));
        let f = only_feature(&ctx);
        assert_eq!(f.original_id, "B0250.1");
        assert_eq!(transcript(f).exons.len(), 2);
        assert!(f.extra_attributes.is_empty());
    }

    #[test]
    fn missing_head_line_is_incomplete() {
        let text = "##gff-version 3\nchr1\tsrc\texon\t1\t5\t.\t+\t.\tParent=tx9\n";
        let (ctx, outcome) = parse(text, ParserConfig::default());
        assert_eq!(outcome.status, ParseStatus::Incomplete);
        assert_eq!(outcome.error.unwrap().kind, ParseErrorKind::IncompleteFeature);
        assert_eq!(only_feature(&ctx).original_id, "tx9");

        let closed = format!("{text}###\n");
        let (_, outcome) = parse(&closed, ParserConfig::default());
        assert_eq!(outcome.status, ParseStatus::Done);
    }

    #[test]
    fn head_after_components_completes_feature() {
        let text = "##gff-version 3\n\
            chr1\tsrc\texon\t1\t5\t.\t+\t.\tParent=tx9\n\
            chr1\tsrc\tCDS\t3\t5\t.\t+\t0\tParent=tx9\n\
            chr1\tsrc\tmRNA\t1\t20\t7\t+\t.\tID=tx9;Name=TX9;Parent=gene9;Note=late head;Dbxref=GeneID:9\n";
        let (ctx, outcome) = parse(text, ParserConfig::default());
        assert_eq!(outcome.status, ParseStatus::Done);
        let f = only_feature(&ctx);
        assert_eq!((f.x1, f.x2), (1, 20));
        assert_eq!(f.ontology, "mRNA");
        assert_eq!(f.original_id, "TX9");
        assert_eq!(f.name.as_deref(), Some("TX9"));
        assert_eq!(f.parent.as_deref(), Some("gene9"));
        assert_eq!(f.notes, ["late head"]);
        assert_eq!(f.score, Some(7.0));
        assert_eq!(f.phase, Phase::None);
        assert_eq!(f.extra_attributes, [("Dbxref".to_string(), "GeneID:9".to_string())]);
        assert_eq!(f.unique_id, "tx9_'+'_1.20");
        assert_eq!(f.gff_id.as_deref(), Some("tx9"));
        assert_eq!(transcript(f).exons, [Span::new(1, 5)]);
        assert_eq!(transcript(f).cds, Some(Span::new(3, 5)));
    }

    #[test]
    fn style_mode_overrides_classifier() {
        let mut config = ParserConfig::default();
        config.styles.push(Style::new("repeats").with_mode(FeatureKind::Basic));
        let text = "##gff-version 3\nchr1\trepeats\texon\t1\t5\t.\t+\t.\tID=a";
        let (ctx, _) = parse(text, config);
        let f = only_feature(&ctx);
        assert_eq!(f.kind(), FeatureKind::Basic);
        assert_eq!(f.style_id.as_deref(), Some("repeats"));
    }

    #[test]
    fn parse_only_counts_without_building() {
        let text = "##gff-version 3\n\
            chr1\tsrc\texon\t1\t5\t.\t+\t.\tID=a\n\
            chr1\tsrc\texon\t10\t15\t.\t+\t.\tID=a\n\
            chr1\tsrc\tregion\t1\t50\t.\t+\t.\t.\n";
        let mut config = ParserConfig::default();
        config.parse_only = true;
        let (ctx, outcome) = parse(text, config);
        assert_eq!(outcome.features_added, 2);
        assert_eq!(ctx.feature_count(), 0);
    }

    #[test]
    fn excluded_parent_drops_children() {
        let text = "##gff-version 3\n\
            chr1\tsrc\tmRNA\t100\t600\t.\t+\t.\tID=tx\n\
            chr1\tsrc\texon\t100\t200\t.\t+\t.\tParent=tx\n";
        let mut config = ParserConfig::new("chr1", 1, 500);
        config.clip_mode = ClipMode::All;
        let (ctx, outcome) = parse(text, config);
        assert_eq!(ctx.feature_count(), 0);
        assert_eq!(outcome.counters.clipped, 2);
        assert_eq!(outcome.status, ParseStatus::Done);
    }

    #[test]
    fn overlap_clips_components() {
        let text = "##gff-version 3\n\
            chr1\tsrc\tmRNA\t400\t700\t.\t+\t.\tID=tx\n\
            chr1\tsrc\texon\t400\t450\t.\t+\t.\tParent=tx\n\
            chr1\tsrc\texon\t600\t700\t.\t+\t.\tParent=tx\n\
            chr1\tsrc\tCDS\t420\t650\t.\t+\t0\tParent=tx\n";
        let (ctx, outcome) = parse(text, ParserConfig::new("chr1", 1, 500));
        let f = only_feature(&ctx);
        assert_eq!((f.x1, f.x2), (400, 500));
        let t = transcript(f);
        assert_eq!(t.exons, vec![Span::new(400, 450)]);
        assert_eq!(t.cds, Some(Span::new(420, 500)));
        assert_eq!(outcome.counters.clipped, 1);
    }

    #[test]
    fn overlap_clips_alignment_blocks() {
        let text = "##gff-version 3\n\
            chr1\tblast\tEST_match\t90\t119\t.\t+\t.\tID=m;Target=E 1 30 +\n";
        let (ctx, _) = parse(text, ParserConfig::new("chr1", 100, 500));
        let h = only_feature(&ctx).homology().unwrap().clone();
        assert_eq!(h.blocks[0].query, Span::new(100, 119));
        assert_eq!(h.blocks[0].target, Span::new(11, 30));
    }

    #[test]
    fn header_directives_recorded() {
        let text = "##gff-version 3\n##source-version acedb 4.9\n##date 2024-03-01\n\
            ##sequence-region chr1 1 100\nchr1\tsrc\tregion\t1\t5\t.\t+\t.\tID=a";
        let mut parser = Parser::new(ParserConfig::default());
        for line in text.lines() {
            parser.parse_line(line).unwrap();
        }
        let header = &parser.state().header;
        assert_eq!(header.source_version.as_deref(), Some("acedb 4.9"));
        assert_eq!(header.sequence_region.as_ref().unwrap().span, Span::new(1, 100));
        assert_eq!(parser.context().window, Some(Span::new(1, 100)));
    }

    #[test]
    fn extra_attributes_and_variation() {
        let text = "##gff-version 3\n\
            chr1\tensembl\tSNP\t50\t50\t.\t+\t.\tID=v1;Name=rs123 - A/G;Dbxref=dbSNP:rs123;evidence=EST,cDNA\n";
        let (ctx, _) = parse(text, ParserConfig::default());
        let f = only_feature(&ctx);
        assert_eq!(f.variation.as_deref(), Some("A/G"));
        assert_eq!(f.evidence, ["EST", "cDNA"]);
        assert_eq!(f.extra("Dbxref"), Some("dbSNP:rs123"));
    }
}
