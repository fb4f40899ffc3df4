//! Stage prompt templates

use crate::synthesis::PromptTemplate;

pub const LOCAL_MARKET: PromptTemplate = PromptTemplate {
    name: "local_market",
    system: "You are a local market researcher. Work only from the data you are given and say plainly when data is missing.",
    body: r#"Summarize the local market for this business idea: {business_idea}.
Business type: {business_type}
Location: {location}

Local businesses found:
{local_data}

Demographic information:
{demographic_data}

Provide:
1. A short list of the most relevant existing businesses (name, address, rating where available)
2. What the listings suggest about supply and customer satisfaction in the area
3. Demographic factors that matter for this business type

Keep every statement tied to the data above."#,
};

pub const TRENDS: PromptTemplate = PromptTemplate {
    name: "trends",
    system: "You are a market trend analyst.",
    body: r#"Identify current trends related to this business idea: {business_idea}.
Location: {location}

Use this search-interest data:
{trends_data}

And these local news items:
{news_data}

Provide a comprehensive analysis of:
1. Overall market trends for this business type
2. Local trends specific to this location (if available)
3. Consumer behavior patterns
4. Emerging opportunities
5. Potential threats or challenges

Format your response with clear sections and actionable insights."#,
};

pub const COMPETITOR: PromptTemplate = PromptTemplate {
    name: "competitor",
    system: "You are a competitive intelligence specialist.",
    body: r#"Analyze the local competitors for this business idea: {business_idea}.
Location: {location}

Here's what is known about the local market:
{local_market}

Based on this information, provide a detailed competitor analysis including:
1. Overview of the competitive landscape
2. Analysis of the top 3-5 competitors (strengths and weaknesses)
3. Gap analysis: what opportunities exist in the market
4. Threat analysis: what challenges a new entrant might face

Format your response with clear sections and detailed analysis."#,
};

pub const MARKET_ASSESSMENT: PromptTemplate = PromptTemplate {
    name: "market_assessment",
    system: "You are a market research analyst.",
    body: r#"Provide a comprehensive market analysis for this business idea: {business_idea}.
Location: {location}

Use this information about the local market:
{local_market}

This information about market trends:
{trend_analysis}

And these industry search results:
{web_research}

Provide an analysis including:
1. Estimated market size for this business type in this location
2. Growth rate and market potential
3. Target audience and customer segments
4. Barriers to entry
5. Key success factors in this market
6. SWOT analysis (Strengths, Weaknesses, Opportunities, Threats)

Your analysis should be specific to the location if provided, and include actionable insights."#,
};

pub const RECOMMENDATIONS: PromptTemplate = PromptTemplate {
    name: "recommendations",
    system: "You are a business strategy advisor.",
    body: r#"Based on the following market analysis, competitor analysis, and trend analysis for the business idea: {business_idea},
provide 5-7 specific, actionable recommendations for the business owner.

Market Analysis:
{market_analysis}

Competitor Analysis:
{competitor_analysis}

Trend Analysis:
{trend_analysis}

Each recommendation should be clear, specific, and directly actionable. Where an analysis above is marked unavailable, recommend how to obtain that information instead of guessing."#,
};
