//! Serialise a feature context back to GFF2 or GFF3 text.

use std::io::Write;

use crate::error::Error;
use crate::model::{Context, Feature, FeatureData, FeatureSet, Homology, Span, Style, Transcript};
use crate::strand::{Phase, Strand};
use crate::term::FeatureKind;

use super::GffVersion;
use super::attribute::{escape_v3, quote_v2};
use super::gap::{blocks_to_cigar, format_v2_gaps};
use super::parser::is_component;

const FASTA_WIDTH: usize = 60;

/// Column 9 under construction, in the chosen dialect.
struct AttributeWriter {
    version: GffVersion,
    parts: Vec<String>,
}

impl AttributeWriter {
    fn new(version: GffVersion) -> Self {
        Self {
            version,
            parts: Vec::new(),
        }
    }

    /// Escaped (v3) or quoted (v2) value.
    fn push(&mut self, key: &str, value: &str) {
        let part = match self.version {
            GffVersion::V3 => format!("{}={}", escape_v3(key), escape_v3(value)),
            GffVersion::V2 if value.is_empty() => key.to_string(),
            GffVersion::V2 => format!("{key} {}", quote_v2(value)),
        };
        self.parts.push(part);
    }

    /// Value written as given; the caller has already escaped its parts.
    fn push_raw(&mut self, key: &str, value: &str) {
        let part = match self.version {
            GffVersion::V3 => format!("{key}={value}"),
            GffVersion::V2 => format!("{key} {value}"),
        };
        self.parts.push(part);
    }

    /// Comma-separated list; commas inside items stay escaped in v3.
    fn push_list(&mut self, key: &str, values: &[String]) {
        match self.version {
            GffVersion::V3 => {
                let joined: Vec<String> = values.iter().map(|v| escape_v3(v)).collect();
                self.push_raw(key, &joined.join(","));
            }
            GffVersion::V2 => self.push(key, &values.join(",")),
        }
    }

    fn flag(&mut self, key: &str) {
        match self.version {
            GffVersion::V3 => self.parts.push(format!("{key}=true")),
            GffVersion::V2 => self.parts.push(key.to_string()),
        }
    }

    fn finish(self) -> String {
        if self.parts.is_empty() {
            return ".".to_string();
        }
        match self.version {
            GffVersion::V3 => self.parts.join(";"),
            GffVersion::V2 => self.parts.join(" ; "),
        }
    }
}

/// One output line before formatting.
struct Row<'a> {
    ontology: &'a str,
    span: Span,
    score: Option<f64>,
    phase: Phase,
    attributes: String,
}

/// Everything common to the lines of one feature.
struct FeatureLines<'a> {
    feature: &'a Feature,
    sequence: &'a str,
    source: &'a str,
    version: GffVersion,
    rows: Vec<Row<'a>>,
}

impl<'a> FeatureLines<'a> {
    fn push(&mut self, ontology: &'a str, span: Span, score: Option<f64>, phase: Phase, attributes: AttributeWriter) {
        self.rows.push(Row {
            ontology,
            span,
            score,
            phase,
            attributes: attributes.finish(),
        });
    }

    fn attributes(&self) -> AttributeWriter {
        AttributeWriter::new(self.version)
    }

    fn finish(self) -> Vec<String> {
        let strand = self.feature.strand;
        self.rows
            .into_iter()
            .map(|row| {
                let score = row.score.map_or_else(|| ".".to_string(), |s| s.to_string());
                format!(
                    "{}\t{}\t{}\t{}\t{}\t{score}\t{strand}\t{}\t{}",
                    self.sequence,
                    self.source,
                    row.ontology,
                    row.span.start,
                    row.span.end,
                    row.phase,
                    row.attributes
                )
            })
            .collect()
    }
}

/// Attribute that groups a feature's lines: `ID`, or `Sequence` for v2 transcripts.
fn key_attribute(version: GffVersion, kind: FeatureKind) -> &'static str {
    match (version, kind) {
        (GffVersion::V2, FeatureKind::Transcript) => "Sequence",
        _ => "ID",
    }
}

fn grouping_key(feature: &Feature) -> &str {
    feature.gff_id.as_deref().unwrap_or(&feature.original_id)
}

/// Name, notes and the other typed fields, then untyped extras.
fn descriptive_attributes(attrs: &mut AttributeWriter, feature: &Feature, with_parent: bool) {
    if let Some(name) = &feature.name {
        attrs.push("Name", name);
    }
    if with_parent && let Some(parent) = &feature.parent {
        attrs.push("Parent", parent);
    }
    if let Some(derives) = &feature.derives_from {
        attrs.push("Derives_from", derives);
    }
    for note in &feature.notes {
        attrs.push("Note", note);
    }
    if let Some(url) = &feature.url {
        attrs.push("URL", url);
    }
    if let Some(locus) = &feature.locus {
        attrs.push("Locus", locus);
    }
    if let Some(variation) = &feature.variation {
        attrs.push("variation", variation);
    }
    if !feature.evidence.is_empty() {
        attrs.push_list("evidence", &feature.evidence);
    }
    for (key, value) in &feature.extra_attributes {
        attrs.push(key, value);
    }
}

fn transcript_flags(attrs: &mut AttributeWriter, transcript: &Transcript) {
    if let Some(codon) = transcript.start_not_found {
        attrs.push_raw("start_not_found", &codon.to_string());
    }
    if transcript.end_not_found {
        attrs.flag("end_not_found");
    }
}

fn basic_lines<'a>(lines: &mut FeatureLines<'a>) {
    let f = lines.feature;
    let mut attrs = lines.attributes();
    if let Some(id) = &f.gff_id {
        attrs.push(key_attribute(lines.version, f.kind()), id);
    }
    descriptive_attributes(&mut attrs, f, true);
    lines.push(&f.ontology, f.span(), f.score, f.phase, attrs);
}

/// A head line followed by exon and CDS lines pointing at it, or, when the feature was
/// first seen as a component, component lines sharing one id.
fn transcript_lines<'a>(lines: &mut FeatureLines<'a>, transcript: &'a Transcript) {
    let f = lines.feature;
    let version = lines.version;
    let key = grouping_key(f);
    let key_attr = key_attribute(version, FeatureKind::Transcript);
    // v3 components point at their head with Parent, everything else repeats the key
    let link = |head_mode: bool| {
        let mut attrs = AttributeWriter::new(version);
        if head_mode && version == GffVersion::V3 {
            attrs.push("Parent", key);
        } else {
            attrs.push(key_attr, key);
        }
        attrs
    };

    let ontology = f.ontology.to_ascii_lowercase();
    let head_mode = !is_component(&ontology);
    let mut exons: &[Span] = &transcript.exons;
    let mut cds_written = false;

    let first_span = if head_mode {
        f.span()
    } else if ontology.contains("cds") {
        cds_written = true;
        transcript.cds.unwrap_or_else(|| f.span())
    } else if ontology.contains("exon")
        && let Some((exon, rest)) = exons.split_first()
    {
        exons = rest;
        *exon
    } else {
        f.span()
    };

    // a keyless feature only gets an id when other rows must point back at it
    let linked = !exons.is_empty() || (transcript.cds.is_some() && !cds_written);
    let mut first = lines.attributes();
    if f.gff_id.is_some() || linked {
        first.push(key_attr, key);
    }
    descriptive_attributes(&mut first, f, head_mode);
    if cds_written || transcript.cds.is_none() {
        transcript_flags(&mut first, transcript);
    }
    lines.push(&f.ontology, first_span, f.score, f.phase, first);

    for exon in exons {
        lines.push("exon", *exon, None, Phase::None, link(head_mode));
    }
    if let Some(cds) = transcript.cds
        && !cds_written
    {
        let mut attrs = link(head_mode);
        transcript_flags(&mut attrs, transcript);
        lines.push("CDS", cds, None, transcript.cds_phase, attrs);
    }
}

fn v3_target(homology: &Homology, target: Option<Span>) -> Option<String> {
    let id = homology.target_id.as_deref()?;
    let mut value = escape_v3(id).replace(' ', "%20");
    if let Some(t) = target {
        value.push_str(&format!(" {} {}", t.start, t.end));
        if homology.target_strand != Strand::None {
            value.push_str(&format!(" {}", homology.target_strand));
        }
    }
    Some(value)
}

fn v2_target(homology: &Homology) -> Option<String> {
    let id = homology.target_id.as_deref()?;
    let id = match homology.homol_type.class_name() {
        Some(class) => format!("{class}:{id}"),
        None => id.to_string(),
    };
    let mut value = quote_v2(&id);
    if let Some(t) = homology.target {
        value.push_str(&format!(" {} {}", t.start, t.end));
        if homology.target_strand != Strand::None {
            value.push_str(&format!(" {}", homology.target_strand));
        }
    }
    Some(value)
}

fn homology_attributes(attrs: &mut AttributeWriter, homology: &Homology) {
    if let Some(pid) = homology.percent_id {
        attrs.push_raw("percentID", &pid.to_string());
    }
    if let Some(length) = homology.length {
        attrs.push_raw("Length", &length.to_string());
    }
    if let Some(clone) = &homology.clone_id {
        attrs.push("Clone", clone);
    }
    if let Some(sequence) = &homology.sequence {
        attrs.push("sequence", sequence);
    }
}

/// One line when the blocks fit a `Gap`/`Gaps` value, otherwise one line per block.
fn alignment_lines<'a>(lines: &mut FeatureLines<'a>, homology: &'a Homology) {
    let f = lines.feature;
    let version = lines.version;
    let span = f.span();
    let single = match homology.blocks.as_slice() {
        [] => true,
        [block] => block.query == span && Some(block.target) == homology.target,
        _ => false,
    };

    let mut attrs = lines.attributes();
    if let Some(id) = &f.gff_id {
        attrs.push("ID", id);
    }
    descriptive_attributes(&mut attrs, f, true);

    if version == GffVersion::V2 {
        if let Some(class) = homology.homol_type.class_name() {
            attrs.push("Class", class);
        }
        if let Some(target) = v2_target(homology) {
            attrs.push_raw("Target", &target);
        }
        if !single {
            attrs.push("Gaps", &format_v2_gaps(&homology.blocks));
        }
        homology_attributes(&mut attrs, homology);
        lines.push(&f.ontology, span, f.score, f.phase, attrs);
        return;
    }

    let gap = match (single, homology.target) {
        (false, Some(target)) => blocks_to_cigar(
            &homology.blocks,
            span,
            f.strand,
            target,
            homology.target_strand,
        ),
        _ => None,
    };
    if single || gap.is_some() {
        if let Some(target) = v3_target(homology, homology.target) {
            attrs.push_raw("Target", &target);
        }
        if let Some(gap) = gap {
            attrs.push_raw("Gap", &gap);
        }
        homology_attributes(&mut attrs, homology);
        lines.push(&f.ontology, span, f.score, f.phase, attrs);
        return;
    }

    // ungappable: every block on its own line, tied together by the id
    let key = grouping_key(f);
    let linked = homology.blocks.len() > 1;
    for (i, block) in homology.blocks.iter().enumerate() {
        let mut line_attrs = if i == 0 {
            std::mem::replace(&mut attrs, AttributeWriter::new(version))
        } else {
            AttributeWriter::new(version)
        };
        if linked && (i > 0 || f.gff_id.is_none()) {
            line_attrs.push("ID", key);
        }
        if let Some(target) = v3_target(homology, Some(block.target)) {
            line_attrs.push_raw("Target", &target);
        }
        if i == 0 {
            homology_attributes(&mut line_attrs, homology);
        }
        lines.push(&f.ontology, block.query, f.score, f.phase, line_attrs);
    }
}

/// GFF lines for one feature, in the order they must be read back.
///
/// A style can override the source column, and supplies the type term when the feature
/// has none.
#[must_use]
pub fn feature_lines(
    feature: &Feature,
    style: Option<&Style>,
    sequence: &str,
    version: GffVersion,
) -> Vec<String> {
    if feature.ontology.is_empty() {
        let mut patched = feature.clone();
        patched.ontology = style
            .and_then(|s| s.gff_feature.clone())
            .unwrap_or_else(|| default_term(feature.kind()).to_string());
        return feature_lines(&patched, style, sequence, version);
    }

    let source = style
        .and_then(|s| s.gff_source.as_deref())
        .unwrap_or(&feature.source);
    let mut lines = FeatureLines {
        feature,
        sequence,
        source: if source.is_empty() { "." } else { source },
        version,
        rows: Vec::new(),
    };

    match &feature.data {
        FeatureData::Basic => basic_lines(&mut lines),
        FeatureData::Transcript(transcript) => transcript_lines(&mut lines, transcript),
        FeatureData::Alignment(homology) => alignment_lines(&mut lines, homology),
    }
    lines.finish()
}

fn default_term(kind: FeatureKind) -> &'static str {
    match kind {
        FeatureKind::Basic => "region",
        FeatureKind::Transcript => "transcript",
        FeatureKind::Alignment => "nucleotide_match",
    }
}

/// Writes contexts, feature sets or single features to a sink.
pub struct Writer<W: Write> {
    out: W,
    version: GffVersion,
}

impl<W: Write> Writer<W> {
    pub fn new(out: W, version: GffVersion) -> Self {
        Self { out, version }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// `##gff-version`, plus `##sequence-region` when the context has a bounded range.
    pub fn write_header(&mut self, context: &Context) -> Result<(), Error> {
        writeln!(self.out, "##gff-version {}", self.version)?;
        if let Some(window) = context.window
            && window != Span::unbounded()
            && !context.sequence_name.is_empty()
        {
            writeln!(
                self.out,
                "##sequence-region {} {} {}",
                context.sequence_name, window.start, window.end
            )?;
        }
        Ok(())
    }

    /// Header, every feature of every block, then sequence. Returns the features written.
    pub fn write_context(&mut self, context: &Context) -> Result<usize, Error> {
        self.write_region(context, None)
    }

    /// Like [`Writer::write_context`], restricted to features overlapping `region`.
    pub fn write_region(&mut self, context: &Context, region: Option<Span>) -> Result<usize, Error> {
        self.write_header(context)?;
        let mut written = 0;
        for alignment in context.alignments.values() {
            for block in &alignment.blocks {
                for set in block.feature_sets.values() {
                    written += self.write_feature_set(context, set, &alignment.sequence_name, region)?;
                }
            }
        }

        let Some(block) = context.master_block() else {
            return Ok(written);
        };
        let has_sequence = block.dna.is_some() || !block.other_sequences.is_empty();
        if has_sequence && self.version == GffVersion::V3 {
            writeln!(self.out, "##FASTA")?;
        }
        if let Some(dna) = &block.dna {
            self.write_sequence(&context.sequence_name, dna)?;
        }
        for (name, sequence) in &block.other_sequences {
            self.write_sequence(name, sequence)?;
        }
        Ok(written)
    }

    /// Features of one set in start order, styled through the context's tables.
    pub fn write_feature_set(
        &mut self,
        context: &Context,
        set: &FeatureSet,
        sequence: &str,
        region: Option<Span>,
    ) -> Result<usize, Error> {
        let style = set
            .style_id
            .as_deref()
            .and_then(|id| context.styles.get(id))
            .or_else(|| context.style_for_source(&set.original_id));
        let mut written = 0;
        for feature in set.sorted_features() {
            if region.is_some_and(|r| !r.overlaps(feature.span())) {
                continue;
            }
            self.write_feature(feature, style, sequence)?;
            written += 1;
        }
        Ok(written)
    }

    pub fn write_feature(
        &mut self,
        feature: &Feature,
        style: Option<&Style>,
        sequence: &str,
    ) -> Result<(), Error> {
        for line in feature_lines(feature, style, sequence, self.version) {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    fn write_sequence(&mut self, name: &str, sequence: &str) -> Result<(), Error> {
        match self.version {
            GffVersion::V3 => writeln!(self.out, ">{name}")?,
            GffVersion::V2 => writeln!(self.out, "##DNA {name}")?,
        }
        for chunk in sequence.as_bytes().chunks(FASTA_WIDTH) {
            let chunk = String::from_utf8_lossy(chunk);
            match self.version {
                GffVersion::V3 => writeln!(self.out, "{chunk}")?,
                GffVersion::V2 => writeln!(self.out, "##{chunk}")?,
            }
        }
        if self.version == GffVersion::V2 {
            writeln!(self.out, "##end-DNA")?;
        }
        Ok(())
    }
}
