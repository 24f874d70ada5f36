//! Prompt templates for each research stage
//!
//! Each stage gets a system prompt and a user prompt builder. Prompts ask for
//! plain text the parsers in this module tree can handle.

use chrono::Utc;

use super::config::DetailLevel;

/// Prompt templates for the research pipeline
pub struct ResearchPrompts;

impl ResearchPrompts {
    fn current_date() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    // =========================================================================
    // PLANNING
    // =========================================================================

    pub fn plan_system() -> String {
        format!(
            r#"You are an expert research agent tasked with deeply investigating topics.
Current date: {date}
Your goal is to create a detailed research plan for the query.
Break down the query into key aspects that need investigation.
Identify potential sources of information and approaches.
Consider different perspectives and potential biases.

Do not use markdown formatting like "**Objective:**" in your response.
Format your response as plain text with clear section headings."#,
            date = Self::current_date()
        )
    }

    pub fn plan_user(query: &str) -> String {
        format!(
            r#"Create a detailed research plan for investigating:
{query}

Your plan should include:
1. Key aspects to investigate
2. Potential sources of information
3. Specific questions to answer
4. Potential challenges and how to address them"#
        )
    }

    pub fn reflect_system() -> String {
        format!(
            r#"You are analyzing research findings to generate insights, identify gaps, and flag irrelevant content.
Current date: {date}
Your analysis should be thorough, critical, and balanced.
Look for patterns, contradictions and unanswered questions.
Assess the reliability and potential biases of sources.
Identify areas where more information is needed."#,
            date = Self::current_date()
        )
    }

    pub fn reflect_user(findings: &str) -> String {
        format!(
            r#"Based on the current findings, provide a detailed analysis:
{findings}

Your analysis should include:
1. Key insights discovered so far, with the strength of evidence for each
2. Important questions that remain unanswered
3. Assessment of source reliability and potential biases
4. Specific areas that need deeper investigation
5. Irrelevant or tangential content that should be excluded from further research"#
        )
    }

    pub fn queries_system() -> String {
        format!(
            r#"You are generating targeted search queries to explore specific aspects of a research topic.
Current date: {date}
Create queries that are specific, focused, and likely to yield relevant results.
Craft queries that a human would type into a search engine.
Each query should target a gap or unanswered question from the current findings.
DO NOT use formatting like "**Category:**" in your queries.
DO NOT number your queries or add prefixes."#,
            date = Self::current_date()
        )
    }

    pub fn queries_user(
        query: &str,
        findings: &str,
        reflection: Option<&str>,
        breadth: usize,
        issued: &[String],
    ) -> String {
        let reflection = reflection.unwrap_or("(no reflection yet)");
        let issued = if issued.is_empty() {
            "(none)".to_string()
        } else {
            issued.join("\n")
        };

        format!(
            r#"Generate {breadth} specific search queries to investigate:
Main query: {query}

Current findings:
{findings}

Latest reflection:
{reflection}

Queries already searched (do not repeat them):
{issued}

Your queries should help:
1. Find specific facts and figures about the topic
2. Verify important claims from reliable sources
3. Explore different perspectives on the issue
4. Find primary sources and official documentation

Format each query as a plain text search query on its own line, without prefixes, numbering, or formatting.
BAD: "**Explore New Angles:** renewable energy funding from government"
GOOD: "total US government funding for renewable energy since 2022""#
        )
    }

    // =========================================================================
    // FILTERING + HARVESTING
    // =========================================================================

    pub fn relevance_system() -> &'static str {
        r#"You are evaluating if a search result is relevant to a query.
Respond with a single word: either "RELEVANT" or "IRRELEVANT"."#
    }

    pub fn relevance_user(subquery: &str, url: &str, title: &str, snippet: &str) -> String {
        format!(
            r#"Query: {subquery}

Search Result:
Title: {title}
URL: {url}
Snippet: {snippet}

Is this result relevant to the query? Consider whether it directly addresses the query topic and comes from a credible source.
Respond with only one word: RELEVANT or IRRELEVANT"#
        )
    }

    pub fn reliability_system() -> &'static str {
        r#"You evaluate the reliability of a web source based on domain reputation, author expertise, citations, objectivity, and recency.
Respond on a single line in exactly this format:
RELIABILITY: [HIGH/MEDIUM/LOW] followed by a brief justification (1-2 sentences)"#
    }

    pub fn reliability_user(url: &str, title: &str, subquery: &str, content: &str) -> String {
        format!(
            r#"Source URL: {url}
Title: {title}
Query: {subquery}
Content: {content}"#
        )
    }

    pub fn extraction_system() -> &'static str {
        r#"You extract comprehensive, detailed information from a web page that is relevant to a research query.
Include facts, statistics, data points, examples and key arguments.
Leave out navigation text, advertising and anything unrelated to the query."#
    }

    pub fn extraction_user(url: &str, title: &str, subquery: &str, content: &str) -> String {
        format!(
            r#"Source URL: {url}
Title: {title}
Query: {subquery}
Content: {content}

Extract the detailed information relevant to the query."#
        )
    }

    // =========================================================================
    // SYNTHESIS + REPORT
    // =========================================================================

    pub fn synthesis_system() -> &'static str {
        r#"You are analyzing web content to extract comprehensive information and organize it thematically.
Group information by themes and integrate data from different sources into unified sections.
When sources contradict each other, state the contradiction explicitly and cite both sides.
Prioritize original research, peer-reviewed content, and official publications."#
    }

    pub fn synthesis_user(subquery: &str, documents: &str) -> String {
        format!(
            r#"Analyze the following content related to: "{subquery}"

Content:
{documents}

Provide a comprehensive analysis including:
1. Key themes and concepts identified across sources
2. Detailed evidence and statistics organized by theme
3. Patterns and trends evident across the sources

IMPORTANT:
Each piece of information must only appear ONCE in your analysis.
If two sources mention the same fact, present it once with all their citations together, e.g. [1, 3].
Cite sources only with the [n] numbers shown above."#
        )
    }

    pub fn report_system(detail: DetailLevel, include_objective: bool) -> String {
        let length = match detail {
            DetailLevel::Low => "concise (roughly 1500 words)",
            DetailLevel::Medium => "detailed (roughly 3500 words)",
            DetailLevel::High => "extremely comprehensive (7000+ words)",
        };

        let mut prompt = format!(
            r#"You are synthesizing research findings into a comprehensive, detailed, and insightful report.
Today's date is {date}.

Your report should be:
- Well-structured with clear sections and logical flow
- {length}, written in long, cohesive paragraphs
- Balanced and objective, presenting multiple perspectives when relevant
- Free of repetition: each key fact appears only once
- Explicit about contradictions between sources

For citations, use numbered references in square brackets [1], [2], etc.
Only use numbers that appear in the provided reference list.
Do not write a References section; it is appended automatically."#,
            date = Self::current_date()
        );

        if !include_objective {
            prompt.push_str(
                "\n\nDo not include an \"Objective\" section. Start directly with an Executive Summary section.",
            );
        }

        prompt
    }

    pub fn report_user(query: &str, findings: &str, references: &str, num_sources: usize) -> String {
        format!(
            r#"Create a comprehensive research report for the query: {query}

Analyzed Findings:
{findings}

Reference list ({num_sources} sources):
{references}

Your report should include the following sections:
1. Executive Summary
2. In-Depth Analysis
3. Evidence Assessment
4. Uncertainties and Open Questions
5. Recommendations for Further Research
6. Additional Insights"#
        )
    }

    // =========================================================================
    // CLARIFICATION
    // =========================================================================

    pub fn clarify_system() -> String {
        format!(
            r#"You are a research assistant helping to clarify research queries.
Current date: {date}
Ask questions that help refine the scope, focus and direction of the research:
1. The specific aspects the user wants to explore
2. The level of detail needed
3. Sources or perspectives to include or exclude
4. The time frame or context relevant to the query
5. The user's background knowledge on the topic"#,
            date = Self::current_date()
        )
    }

    pub fn clarify_user(query: &str, count: usize) -> String {
        format!(
            r#"Generate {count} follow-up questions to better understand the research needs for the query: "{query}"
Questions should be concise and specific, one per line.
Each question should address a different aspect of the research needs."#
        )
    }

    pub fn refine_system() -> String {
        format!(
            r#"You are refining a research query based on user responses.
Current date: {date}
Write a research context that includes:
1. A clear objective statement that begins with "Objective:"
2. Key aspects to focus on based on the responses
3. Any constraints or preferences mentioned
4. Specific areas to explore in depth

Do not use markdown formatting like "**Objective:**" in your response.
Format your response as plain text with clear section headings."#,
            date = Self::current_date()
        )
    }

    pub fn refine_user(query: &str, answers: &str) -> String {
        format!(
            r#"Original query: {query}
Follow-up questions and answers:
{answers}

Provide a refined research query that captures every important detail from the responses.
It should be comprehensive but focused."#
        )
    }

    // =========================================================================
    // QUICK SEARCH
    // =========================================================================

    pub fn quick_system(detailed: bool) -> String {
        let task = if detailed {
            "Provide a thorough, critical analysis. Note potential biases, assess source credibility and point out contradictions between sources."
        } else {
            "Provide a concise, neutral summary that directly answers the query using the most relevant and reliable results."
        };
        format!(
            "You are analyzing search results for a research query.\nCurrent date: {date}\n{task}",
            date = Self::current_date()
        )
    }

    pub fn quick_user(query: &str, results: &str) -> String {
        format!(
            r#"Analyze the following search results for the query: "{query}"

Results:
{results}

Cite results by their [n] number when referring to them.
If the results contain little or no relevant information, state this clearly."#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_include_inputs() {
        assert!(ResearchPrompts::plan_user("quantum sensors").contains("quantum sensors"));
        assert!(ResearchPrompts::relevance_user("q", "https://a.com", "A", "s").contains("https://a.com"));
        assert!(ResearchPrompts::synthesis_user("q", "[1] doc").contains("[1] doc"));
        assert!(ResearchPrompts::clarify_user("tidal power", 3).contains("Generate 3 follow-up"));
        assert!(ResearchPrompts::quick_user("q", "[1] hit").contains("[1] hit"));
    }

    #[test]
    fn test_queries_prompt_lists_issued() {
        let prompt = ResearchPrompts::queries_user(
            "q",
            "findings",
            Some("gap: costs"),
            3,
            &["first query".to_string()],
        );
        assert!(prompt.contains("Generate 3 specific"));
        assert!(prompt.contains("gap: costs"));
        assert!(prompt.contains("first query"));
    }

    #[test]
    fn test_report_objective_toggle() {
        let without = ResearchPrompts::report_system(DetailLevel::High, false);
        assert!(without.contains("Do not include an \"Objective\" section"));
        assert!(without.contains("7000+"));

        let with = ResearchPrompts::report_system(DetailLevel::Low, true);
        assert!(!with.contains("Do not include an \"Objective\" section"));
        assert!(with.contains("1500"));
    }
}
