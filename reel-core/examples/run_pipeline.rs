//! Walk a short story through the full pipeline and print the results.

use std::sync::Arc;

use reel_core::{
    AnalysisEngine, AnalysisStage, ContinuityEngine, ContinuityStage, EventSubscriber,
    InMemoryManifestationStore, KeywordSentiment, MockGeneration, Orchestrator, PipelineData,
    PipelineEvent, RewordingEngine, RewordingStage, RewordingStyle, SegmentationStage,
    TaxonomyStage, DEFAULT_PIPELINE_ORDER,
};

const STORY: &str = "Maria stepped into the old lighthouse at dusk. The lamp room smelled of \
salt and rust, and her flashlight caught a brass key on the floor.\n\nShe climbed the spiral \
stairs slowly. Each step groaned under her boots, and somewhere above, a door banged in the \
wind.\n\nAt the top, the great lamp still turned. Maria laughed in disbelief. After all these \
years, someone had kept the light burning.";

struct PrintingSubscriber;

impl EventSubscriber for PrintingSubscriber {
    fn handle(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StageStarted { stage_id, .. } => {
                println!("   -> {stage_id} started");
            }
            PipelineEvent::StageCompleted {
                stage_id, elapsed, ..
            } => {
                println!("   <- {stage_id} finished in {elapsed:?}");
            }
            PipelineEvent::StageFailed { stage_id, error, .. } => {
                println!("   !! {stage_id} failed: {error}");
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Prose to Storyboard ===\n");

    // 1. Wire up the orchestrator
    println!("1. Registering stages...");
    let store = Arc::new(InMemoryManifestationStore::new());
    let sentiment = Arc::new(KeywordSentiment);

    let mut orchestrator = Orchestrator::new();
    orchestrator.register(Arc::new(SegmentationStage::new()));
    orchestrator.register(Arc::new(TaxonomyStage::new()));
    orchestrator.register(Arc::new(ContinuityStage::new(ContinuityEngine::new(
        store.clone(),
        sentiment.clone(),
    ))));
    orchestrator.register(Arc::new(AnalysisStage::new(AnalysisEngine::new(
        sentiment.clone(),
    ))));
    orchestrator.register(Arc::new(RewordingStage::new(
        RewordingEngine::new(Arc::new(MockGeneration::new(Vec::<String>::new()))),
        RewordingStyle::CinematicMood,
    )));
    orchestrator.subscribe(Arc::new(PrintingSubscriber));
    println!("   {} stages registered", orchestrator.stage_ids().len());

    // 2. Run the core chain
    println!("\n2. Running {:?}...", DEFAULT_PIPELINE_ORDER);
    let run = orchestrator
        .run_pipeline(&DEFAULT_PIPELINE_ORDER, STORY, "lighthouse")
        .await;

    if let Some(failure) = &run.failure {
        println!("   Run failed: {failure}");
        return Ok(());
    }

    // 3. Inspect the storyboard
    let Some(PipelineData::Continuity(report)) = run.output("continuity") else {
        println!("   No continuity report produced");
        return Ok(());
    };

    println!("\n3. Storyboard ({} segments):", report.segments.len());
    for segment in &report.segments {
        let treatment = segment
            .treatment
            .as_ref()
            .map(|t| t.shot_type.name())
            .unwrap_or("untreated");
        println!(
            "   #{} [{:.1}s, {}]",
            segment.index, segment.target_duration_secs, treatment
        );
        for line in segment.content.lines() {
            println!("      {line}");
        }
    }

    println!("\n4. Continuity:");
    println!("   overall confidence: {:.3}", report.overall_confidence);
    println!("   human review needed: {}", report.requires_human_review);
    for record in report.issues.iter().filter(|r| !r.issues.is_empty()) {
        println!("   segment {}: {:?}", record.segment_index, record.issues);
    }

    // 5. Side chain: story analysis
    println!("\n5. Story analysis:");
    let analysis_run = orchestrator
        .run_pipeline(&["analysis"], STORY, "lighthouse")
        .await;
    if let Some(PipelineData::Analysis(output)) = analysis_run.output("analysis") {
        println!(
            "   method: {} (confidence {:.2})",
            output.extraction_method, output.confidence
        );
        println!("   arc: {}", output.analysis.narrative_arc);
        println!("   themes: {:?}", output.analysis.themes);
    }

    println!("\n=== Done ===");
    Ok(())
}
